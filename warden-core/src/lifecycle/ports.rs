//! Collaborator ports the boot sequence drives.
//!
//! Each trait stands in for an external system the coordinator only needs to
//! poke at boot and shutdown; their real behaviour lives outside this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModuleError;

/// Process-wide document store connection.
#[async_trait]
pub trait PersistenceLayer: Send + Sync {
    async fn connect(&self) -> anyhow::Result<()>;

    /// Binds every named collection collaborators will use.
    async fn bind_collections(&self, names: &[String]) -> anyhow::Result<()>;

    async fn close(&self) {}
}

/// Deployment-specific configuration document of an isolated deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub tenant_id: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_tenant(&self, tenant_id: &str) -> anyhow::Result<Option<TenantRecord>>;
}

/// Auxiliary REST clients and asset caches.
#[async_trait]
pub trait ClientPool: Send + Sync {
    /// Builds clients and prefetches caches.
    async fn warm(&self) -> anyhow::Result<()>;

    /// Releases pooled network resources.
    async fn close(&self);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    #[serde(default)]
    pub experimental: bool,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            experimental: false,
        }
    }

    pub fn experimental(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            experimental: true,
        }
    }
}

/// Discovers and loads feature modules.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn discover(&self) -> anyhow::Result<Vec<ModuleDescriptor>>;

    async fn load(&self, module: &ModuleDescriptor) -> Result<(), ModuleError>;
}

/// Where the command registry was synchronized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CommandSyncScope {
    Global,
    /// Global commands mirrored into one fixed scope instead.
    Mirrored { scope_id: u64 },
}

#[async_trait]
pub trait CommandRegistry: Send + Sync {
    async fn sync_global(&self) -> anyhow::Result<()>;

    async fn mirror_global_into(&self, scope_id: u64) -> anyhow::Result<()>;
}
