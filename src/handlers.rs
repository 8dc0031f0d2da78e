pub mod imports;
pub mod lists;
