pub mod contacts;
pub mod import;
