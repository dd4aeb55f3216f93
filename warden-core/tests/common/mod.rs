// Shared fakes; not every test binary uses every helper.
#![allow(unused)]

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use warden_core::{
    Clock, JobError, ModuleError, ViewError,
    jobs::BackgroundJob,
    lifecycle::ports::{
        ClientPool, CommandRegistry, ModuleDescriptor, ModuleLoader, PersistenceLayer,
        TenantDirectory, TenantRecord,
    },
    views::{PersistedView, ViewId, ViewStore},
};

/// Ordered log shared between fakes so tests can assert on call order.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().iter().filter(|e| e.as_str() == event).count()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == event)
    }
}

/// Job that records when it was started according to `clock`.
pub struct RecordingJob {
    name: String,
    clock: Arc<dyn Clock>,
    fail: bool,
    pub starts: Mutex<Vec<DateTime<Utc>>>,
    pub stops: AtomicUsize,
    log: EventLog,
}

impl RecordingJob {
    pub fn new(name: &str, clock: Arc<dyn Clock>, log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            clock,
            fail: false,
            starts: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            log,
        })
    }

    pub fn failing(name: &str, clock: Arc<dyn Clock>, log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            clock,
            fail: true,
            starts: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            log,
        })
    }

    pub fn start_count(&self) -> usize {
        self.starts.lock().len()
    }

    pub fn first_start(&self) -> Option<DateTime<Utc>> {
        self.starts.lock().first().copied()
    }
}

#[async_trait]
impl BackgroundJob for RecordingJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), JobError> {
        self.log.push(format!("start:{}", self.name));
        if self.fail {
            return Err(JobError::Start {
                name: self.name.clone(),
                source: anyhow!("loop refused to start"),
            });
        }
        self.starts.lock().push(self.clock.now());
        Ok(())
    }

    async fn stop(&self) {
        self.log.push(format!("stop:{}", self.name));
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory view store fed with raw documents.
#[derive(Default)]
pub struct MemoryViewStore {
    pub records: Mutex<Vec<PersistedView>>,
    pub deleted: Mutex<Vec<ViewId>>,
    pub fail_listing: bool,
    /// When set, `list_all` signals `entered` and waits for `release`.
    pub gated: bool,
    pub entered: Notify,
    pub release: Notify,
}

impl MemoryViewStore {
    pub fn from_documents(docs: &[Value]) -> Arc<Self> {
        let records = docs
            .iter()
            .map(|doc| PersistedView::from_document(doc).expect("valid test document"))
            .collect();
        Arc::new(Self {
            records: Mutex::new(records),
            ..Self::default()
        })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            fail_listing: true,
            ..Self::default()
        })
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.id.0.clone()).collect()
    }
}

#[async_trait]
impl ViewStore for MemoryViewStore {
    async fn list_all(&self) -> Result<Vec<PersistedView>, ViewError> {
        if self.fail_listing {
            return Err(ViewError::Store(anyhow!("collection unavailable")));
        }
        if self.gated {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(self.records.lock().clone())
    }

    async fn delete_by_id(&self, id: &ViewId) -> Result<(), ViewError> {
        self.records.lock().retain(|record| &record.id != id);
        self.deleted.lock().push(id.clone());
        Ok(())
    }
}

pub struct FakePersistence {
    pub log: EventLog,
    pub fail_connect: bool,
}

#[async_trait]
impl PersistenceLayer for FakePersistence {
    async fn connect(&self) -> anyhow::Result<()> {
        self.log.push("persistence:connect");
        if self.fail_connect {
            return Err(anyhow!("connection refused"));
        }
        Ok(())
    }

    async fn bind_collections(&self, names: &[String]) -> anyhow::Result<()> {
        self.log.push(format!("persistence:bind:{}", names.len()));
        Ok(())
    }

    async fn close(&self) {
        self.log.push("persistence:close");
    }
}

pub struct FakeTenants {
    pub log: EventLog,
    pub known: Vec<TenantRecord>,
}

#[async_trait]
impl TenantDirectory for FakeTenants {
    async fn find_tenant(&self, tenant_id: &str) -> anyhow::Result<Option<TenantRecord>> {
        self.log.push(format!("tenant:{tenant_id}"));
        Ok(self
            .known
            .iter()
            .find(|record| record.tenant_id == tenant_id)
            .cloned())
    }
}

pub struct FakeClients {
    pub log: EventLog,
}

#[async_trait]
impl ClientPool for FakeClients {
    async fn warm(&self) -> anyhow::Result<()> {
        self.log.push("clients:warm");
        Ok(())
    }

    async fn close(&self) {
        self.log.push("clients:close");
    }
}

pub struct FakeModules {
    pub log: EventLog,
    pub available: Vec<ModuleDescriptor>,
    pub broken: HashSet<String>,
}

#[async_trait]
impl ModuleLoader for FakeModules {
    async fn discover(&self) -> anyhow::Result<Vec<ModuleDescriptor>> {
        self.log.push("modules:discover");
        Ok(self.available.clone())
    }

    async fn load(&self, module: &ModuleDescriptor) -> Result<(), ModuleError> {
        if self.broken.contains(&module.name) {
            return Err(ModuleError::Load {
                name: module.name.clone(),
                source: anyhow!("syntax error"),
            });
        }
        self.log.push(format!("load:{}", module.name));
        Ok(())
    }
}

pub struct FakeCommands {
    pub log: EventLog,
}

#[async_trait]
impl CommandRegistry for FakeCommands {
    async fn sync_global(&self) -> anyhow::Result<()> {
        self.log.push("commands:global");
        Ok(())
    }

    async fn mirror_global_into(&self, scope_id: u64) -> anyhow::Result<()> {
        self.log.push(format!("commands:mirror:{scope_id}"));
        Ok(())
    }
}
