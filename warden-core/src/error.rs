use thiserror::Error;

use crate::views::ViewId;

/// Failure raised while starting a single background job.
///
/// The orchestrator logs these and moves on to the next job.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("job `{0}` is already running")]
    AlreadyRunning(String),

    #[error("job `{name}` failed to start: {source}")]
    Start {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Failure raised while loading a single feature module.
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("module `{0}` not found")]
    NotFound(String),

    #[error("module `{name}` failed to load: {source}")]
    Load {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Failure scoped to one persisted view record.
#[derive(Error, Debug)]
pub enum ViewError {
    #[error("view record {id} is malformed: {reason}")]
    Malformed { id: ViewId, reason: String },

    #[error("view store error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Fatal boot failure. Anything surfaced here aborts startup.
#[derive(Error, Debug)]
pub enum BootError {
    #[error("failed to connect to persistence: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error(
        "tenant record `{tenant_id}` not found; the isolated deployment cannot start (subscription lapsed or tenant id misconfigured)"
    )]
    TenantMissing { tenant_id: String },

    #[error("tenant lookup failed: {0}")]
    TenantLookup(#[source] anyhow::Error),

    #[error("failed to construct API clients: {0}")]
    Clients(#[source] anyhow::Error),

    #[error("feature module discovery failed: {0}")]
    ModuleDiscovery(#[source] anyhow::Error),

    #[error("command registry sync failed: {0}")]
    CommandSync(#[source] anyhow::Error),

    #[error("view rehydration failed: {0}")]
    Rehydration(#[from] ViewError),

    #[error("shutdown was requested before boot finished")]
    ShutdownRequested,
}

pub type Result<T, E = BootError> = std::result::Result<T, E>;
