pub mod file_ingestor;
pub mod column_mapper;
pub mod custom_field_catalog;
pub use custom_field_catalog::CustomFieldCatalog;
pub mod deduplicator;
pub mod contact_writer;
pub mod list_linker;
pub mod custom_value_writer;
pub mod external_sync;
pub use external_sync::{ExternalSyncAdapter, MarketingService, SyncSettings};
pub mod marketing_client;
pub use marketing_client::HttpMarketingClient;
pub mod import_service;
pub use import_service::ImportService;
