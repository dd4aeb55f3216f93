use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex as SyncMutex;
use tokio::{
    sync::{Mutex, OnceCell},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ports::{
    ClientPool, CommandRegistry, CommandSyncScope, ModuleDescriptor, ModuleLoader,
    PersistenceLayer, TenantDirectory, TenantRecord,
};
use crate::{
    error::BootError,
    jobs::{OrchestrationReport, TaskOrchestrator},
    mode::DeploymentMode,
    views::{RehydrationReport, ViewStateRehydrator},
};

/// How the command registry gets synchronized on first boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSyncPolicy {
    /// Operator approved a global sync.
    pub global: bool,
    /// Scope global commands are mirrored into when not syncing globally.
    pub mirror_scope_id: u64,
}

impl CommandSyncPolicy {
    pub fn scope(&self) -> CommandSyncScope {
        if self.global {
            CommandSyncScope::Global
        } else {
            CommandSyncScope::Mirrored {
                scope_id: self.mirror_scope_id,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSettings {
    pub mode: DeploymentMode,
    /// Tenant to resolve when the mode requires one.
    pub tenant_id: Option<String>,
    /// Collections bound right after connecting.
    pub collections: Vec<String>,
    /// Module loaded after every other module. Empty disables it.
    pub hot_reload_module: String,
    pub command_sync: CommandSyncPolicy,
}

/// External collaborators the boot sequence drives.
#[derive(Clone)]
pub struct BootPorts {
    pub persistence: Arc<dyn PersistenceLayer>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub clients: Arc<dyn ClientPool>,
    pub modules: Arc<dyn ModuleLoader>,
    pub commands: Arc<dyn CommandRegistry>,
}

impl fmt::Debug for BootPorts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootPorts").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleReport {
    /// Loaded modules, in load order.
    pub loaded: Vec<String>,
    pub failed: Vec<ModuleFailure>,
    /// Experimental modules left out for this deployment mode.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    pub tenant: Option<TenantRecord>,
    pub modules: ModuleReport,
    pub command_sync: CommandSyncScope,
    pub rehydration: RehydrationReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    Ready(BootReport),
    /// A previous trigger already completed boot; nothing was done.
    AlreadyInitialized,
}

struct BackgroundRun {
    token: CancellationToken,
    handle: JoinHandle<OrchestrationReport>,
}

/// Runs the boot sequence once per process and tears it down on shutdown.
///
/// `boot` may be triggered repeatedly (every gateway reconnect fires it);
/// only the first successful call does any work.
pub struct LifecycleCoordinator<C> {
    settings: LifecycleSettings,
    ports: BootPorts,
    orchestrator: Arc<TaskOrchestrator>,
    rehydrator: ViewStateRehydrator<C>,
    boot_lock: Mutex<()>,
    initialized: AtomicBool,
    ready: AtomicBool,
    command_sync: OnceCell<CommandSyncScope>,
    background: SyncMutex<Option<BackgroundRun>>,
    shutdown: CancellationToken,
}

impl<C> fmt::Debug for LifecycleCoordinator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("settings", &self.settings)
            .field("orchestrator", &self.orchestrator)
            .field("rehydrator", &self.rehydrator)
            .field("initialized", &self.initialized.load(Ordering::Acquire))
            .field("ready", &self.ready.load(Ordering::Acquire))
            .field("command_sync", &self.command_sync.get())
            .field("shutdown_cancelled", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl<C: Send + Sync + 'static> LifecycleCoordinator<C> {
    pub fn new(
        settings: LifecycleSettings,
        ports: BootPorts,
        orchestrator: Arc<TaskOrchestrator>,
        rehydrator: ViewStateRehydrator<C>,
    ) -> Self {
        Self {
            settings,
            ports,
            orchestrator,
            rehydrator,
            boot_lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            command_sync: OnceCell::new(),
            background: SyncMutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn orchestrator(&self) -> Arc<TaskOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// Scope the command registry was synchronized to, once decided.
    pub fn command_sync_scope(&self) -> Option<CommandSyncScope> {
        self.command_sync.get().copied()
    }

    /// Runs the boot sequence unless it already completed.
    pub async fn boot(&self, owner: Arc<C>) -> Result<BootOutcome, BootError> {
        let _boot = self.boot_lock.lock().await;
        if self.initialized.load(Ordering::Acquire) {
            debug!("boot already completed; ignoring duplicate trigger");
            return Ok(BootOutcome::AlreadyInitialized);
        }

        info!(mode = %self.settings.mode, "Booting");

        self.ports
            .persistence
            .connect()
            .await
            .map_err(BootError::Persistence)?;
        self.ports
            .persistence
            .bind_collections(&self.settings.collections)
            .await
            .map_err(BootError::Persistence)?;
        info!(collections = self.settings.collections.len(), "Connected to persistence");

        let tenant = self.resolve_tenant().await?;

        self.ports.clients.warm().await.map_err(BootError::Clients)?;

        let modules = self.load_modules().await?;
        let command_sync = self.sync_commands().await?;

        self.launch_orchestrator();

        let rehydration = match self.rehydrator.rehydrate(&owner).await {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, "view rehydration failed; aborting boot");
                self.stop_background().await;
                return Err(err.into());
            }
        };

        if self.shutdown.is_cancelled() {
            warn!("shutdown requested during boot; not marking ready");
            self.stop_background().await;
            return Err(BootError::ShutdownRequested);
        }
        self.initialized.store(true, Ordering::Release);
        self.ready.store(true, Ordering::Release);
        info!(
            modules = modules.loaded.len(),
            views = rehydration.restored,
            "Ready"
        );

        Ok(BootOutcome::Ready(BootReport {
            tenant,
            modules,
            command_sync,
            rehydration,
        }))
    }

    async fn resolve_tenant(&self) -> Result<Option<TenantRecord>, BootError> {
        if !self.settings.mode.requires_tenant() {
            return Ok(None);
        }

        let tenant_id = self
            .settings
            .tenant_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| BootError::TenantMissing {
                tenant_id: "<unset>".to_string(),
            })?;

        match self
            .ports
            .tenants
            .find_tenant(&tenant_id)
            .await
            .map_err(BootError::TenantLookup)?
        {
            Some(record) => {
                info!(tenant = %record.tenant_id, "Resolved tenant record");
                Ok(Some(record))
            }
            None => Err(BootError::TenantMissing { tenant_id }),
        }
    }

    async fn load_modules(&self) -> Result<ModuleReport, BootError> {
        let discovered = self
            .ports
            .modules
            .discover()
            .await
            .map_err(BootError::ModuleDiscovery)?;

        let hot_reload = self.settings.hot_reload_module.as_str();
        let mut report = ModuleReport::default();

        for module in discovered {
            if !hot_reload.is_empty() && module.name == hot_reload {
                continue;
            }
            if module.experimental && !self.settings.mode.allows_experimental() {
                debug!(module = %module.name, mode = %self.settings.mode, "skipping experimental module");
                report.skipped.push(module.name);
                continue;
            }
            self.load_one(&module, &mut report).await;
        }

        if !hot_reload.is_empty() {
            self.load_one(&ModuleDescriptor::new(hot_reload), &mut report)
                .await;
        }

        Ok(report)
    }

    async fn load_one(&self, module: &ModuleDescriptor, report: &mut ModuleReport) {
        match self.ports.modules.load(module).await {
            Ok(()) => {
                info!(module = %module.name, "Loaded module");
                report.loaded.push(module.name.clone());
            }
            Err(err) => {
                error!(module = %module.name, error = %err, "Failed to load module");
                report.failed.push(ModuleFailure {
                    name: module.name.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    async fn sync_commands(&self) -> Result<CommandSyncScope, BootError> {
        let scope = self
            .command_sync
            .get_or_try_init(|| async {
                let scope = self.settings.command_sync.scope();
                let synced = match scope {
                    CommandSyncScope::Global => {
                        info!("Global syncing commands...");
                        self.ports.commands.sync_global().await
                    }
                    CommandSyncScope::Mirrored { scope_id } => {
                        info!(scope_id, "Skipping global sync; mirroring commands into default scope");
                        self.ports.commands.mirror_global_into(scope_id).await
                    }
                };
                synced.map(|()| scope).map_err(BootError::CommandSync)
            })
            .await?;
        Ok(*scope)
    }

    fn launch_orchestrator(&self) {
        let mut background = self.background.lock();
        if background
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
        {
            debug!("background job orchestration already running");
            return;
        }

        let token = self.shutdown.child_token();
        let run_token = token.clone();
        let orchestrator = Arc::clone(&self.orchestrator);
        let handle = tokio::spawn(async move { orchestrator.start_all(&run_token).await });
        *background = Some(BackgroundRun { token, handle });
    }

    /// Waits for the orchestration task without cancelling it.
    pub async fn join_orchestration(&self) -> Option<OrchestrationReport> {
        let run = self.background.lock().take()?;
        Self::join(run.handle).await
    }

    async fn stop_background(&self) -> Option<OrchestrationReport> {
        let run = self.background.lock().take()?;
        run.token.cancel();
        Self::join(run.handle).await
    }

    async fn join(handle: JoinHandle<OrchestrationReport>) -> Option<OrchestrationReport> {
        match handle.await {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(error = %err, "background job orchestration task did not finish cleanly");
                None
            }
        }
    }

    /// Cancels orchestration, stops running jobs and releases pooled
    /// resources.
    pub async fn shutdown(&self) {
        info!("Shutting down");
        self.ready.store(false, Ordering::Release);
        self.shutdown.cancel();

        if let Some(report) = self.stop_background().await
            && report.cancelled
        {
            info!(
                started = report.started.len(),
                "background job startup was interrupted by shutdown"
            );
        }

        self.orchestrator.stop_all().await;
        self.ports.clients.close().await;
        self.ports.persistence.close().await;
    }
}
