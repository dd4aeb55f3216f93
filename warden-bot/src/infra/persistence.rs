use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};
use url::Url;
use warden_core::lifecycle::ports::PersistenceLayer;

/// Persistence layer for builds without a document-store driver.
///
/// `connect` only validates the configured store URL and `bind_collections`
/// only records the requested names. Nothing is read from or written to the
/// store; view records come from [`JsonViewStore`](super::JsonViewStore).
pub struct OfflineDocumentStore {
    url: String,
    database: String,
    open: AtomicBool,
    collections: RwLock<Vec<String>>,
}

impl fmt::Debug for OfflineDocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineDocumentStore")
            .field("database", &self.database)
            .field("open", &self.is_open())
            .field("collections", &self.collections.read().len())
            .finish_non_exhaustive()
    }
}

impl OfflineDocumentStore {
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            open: AtomicBool::new(false),
            collections: RwLock::new(Vec::new()),
        }
    }

    /// Whether the store settings were validated and not yet closed.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Whether `collection` was among the recorded names.
    pub fn is_bound(&self, collection: &str) -> bool {
        self.collections.read().iter().any(|name| name == collection)
    }

    pub fn collections(&self) -> Vec<String> {
        self.collections.read().clone()
    }
}

#[async_trait]
impl PersistenceLayer for OfflineDocumentStore {
    async fn connect(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.url).context("invalid document store URL")?;
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| anyhow!("document store URL has no host"))?;
        self.open.store(true, Ordering::Release);
        info!(
            host,
            database = %self.database,
            "document store settings validated; running without a database driver"
        );
        Ok(())
    }

    async fn bind_collections(&self, names: &[String]) -> anyhow::Result<()> {
        if !self.is_open() {
            bail!("cannot record collections before the store settings are validated");
        }
        let mut collections = self.collections.write();
        for name in names {
            if !collections.contains(name) {
                collections.push(name.clone());
            }
        }
        debug!(count = collections.len(), "recorded document collection names");
        Ok(())
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.collections.write().clear();
            info!(database = %self.database, "offline document store closed");
        }
    }
}
