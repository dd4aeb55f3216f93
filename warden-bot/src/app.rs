//! Wires configuration and the local adapters into a bootable bot.

use std::{fmt, sync::Arc};

use warden_config::Config;
use warden_core::{
    BootError, Clock, RateLimitedDispatcher, TaskOrchestrator, TokioClock, ViewRouter,
    ViewStateRehydrator,
    lifecycle::{BootOutcome, BootPorts, CommandSyncPolicy, LifecycleCoordinator, LifecycleSettings},
    views::LeaveNoticeBlueprint,
};

use crate::{
    context::BotContext,
    infra::{
        CatalogModuleLoader, OfflineDocumentStore, HttpClientPool, JsonTenantDirectory,
        JsonViewStore, LoggingCommandRegistry,
    },
    jobs::{default_collections, job_catalog},
};

/// A fully wired bot, ready to boot.
pub struct App {
    context: Arc<BotContext>,
    coordinator: LifecycleCoordinator<BotContext>,
    persistence: Arc<OfflineDocumentStore>,
    modules: Arc<CatalogModuleLoader>,
    commands: Arc<LoggingCommandRegistry>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("context", &self.context)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl App {
    pub fn build(config: Config, global_sync: bool) -> Self {
        Self::build_with_clock(config, global_sync, Arc::new(TokioClock))
    }

    /// Builds the bot with every sleeping component on `clock`.
    pub fn build_with_clock(config: Config, global_sync: bool, clock: Arc<dyn Clock>) -> Self {
        let config = Arc::new(config);

        let dispatcher = Arc::new(RateLimitedDispatcher::with_clock(
            config.dispatcher_config(),
            Arc::clone(&clock),
        ));
        let router = Arc::new(ViewRouter::new());
        let http = Arc::new(HttpClientPool::new(
            Arc::clone(&dispatcher),
            config.clients.request_timeout,
        ));
        let context = Arc::new(BotContext::new(
            Arc::clone(&config),
            dispatcher,
            Arc::clone(&router),
            Arc::clone(&http),
        ));

        let persistence = Arc::new(OfflineDocumentStore::new(
            config.database.url.clone(),
            config.database.name.clone(),
        ));
        let modules = Arc::new(CatalogModuleLoader::from_config(&config.modules));
        let commands = Arc::new(LoggingCommandRegistry::new());
        let ports = BootPorts {
            persistence: Arc::clone(&persistence) as _,
            tenants: Arc::new(JsonTenantDirectory::new(config.views.tenants_path.clone())),
            clients: http,
            modules: Arc::clone(&modules) as _,
            commands: Arc::clone(&commands) as _,
        };

        let orchestrator = Arc::new(TaskOrchestrator::with_clock(
            job_catalog(&context),
            config.orchestrator_config(),
            config.environment,
            Arc::clone(&clock),
        ));
        let rehydrator = ViewStateRehydrator::new(
            Arc::new(JsonViewStore::new(config.views.store_path.clone())),
            router,
        )
        .with_clock(clock)
        .register(Arc::new(LeaveNoticeBlueprint));

        let settings = LifecycleSettings {
            mode: config.environment,
            tenant_id: config.tenant_id.clone(),
            collections: default_collections(),
            hot_reload_module: config.modules.hot_reload.clone(),
            command_sync: CommandSyncPolicy {
                global: global_sync,
                mirror_scope_id: config.commands.mirror_scope_id,
            },
        };

        Self {
            context,
            coordinator: LifecycleCoordinator::new(settings, ports, orchestrator, rehydrator),
            persistence,
            modules,
            commands,
        }
    }

    pub fn context(&self) -> &Arc<BotContext> {
        &self.context
    }

    pub fn coordinator(&self) -> &LifecycleCoordinator<BotContext> {
        &self.coordinator
    }

    pub fn persistence(&self) -> &OfflineDocumentStore {
        &self.persistence
    }

    pub fn modules(&self) -> &CatalogModuleLoader {
        &self.modules
    }

    pub fn commands(&self) -> &LoggingCommandRegistry {
        &self.commands
    }

    /// Boots the bot; repeated calls after a successful boot are no-ops.
    pub async fn boot(&self) -> Result<BootOutcome, BootError> {
        self.coordinator.boot(Arc::clone(&self.context)).await
    }

    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
        self.context.dispatcher().close();
    }
}
