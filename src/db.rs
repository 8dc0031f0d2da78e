pub mod contact_store;
pub use contact_store::ContactStore;
pub mod contacts_repo;
pub use contacts_repo::ContactRepository;
pub mod memory_store;
pub use memory_store::MemoryContactStore;
pub mod family_repo;
pub use family_repo::FamilyRepository;
