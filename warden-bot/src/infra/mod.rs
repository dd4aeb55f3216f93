//! Local adapters for the collaborator ports the boot sequence drives.

pub mod commands;
pub mod http;
pub mod modules;
pub mod persistence;
pub mod tenants;
pub mod view_store;

pub use commands::LoggingCommandRegistry;
pub use http::{HttpClientPool, UpstreamError};
pub use modules::CatalogModuleLoader;
pub use persistence::OfflineDocumentStore;
pub use tenants::JsonTenantDirectory;
pub use view_store::JsonViewStore;
