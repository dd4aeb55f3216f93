pub mod sources;

use std::{path::PathBuf, time::Duration};

use url::Url;
use warden_core::{
    DeploymentMode,
    dispatch::{DelayPolicy, DispatcherConfig},
    jobs::OrchestratorConfig,
};

/// Scope global commands are mirrored into when a global sync is declined.
pub const DEFAULT_MIRROR_SCOPE_ID: u64 = 1_403_328_821_121_388_674;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: DeploymentMode,
    pub database: DatabaseConfig,
    /// Tenant resolved at boot by isolated deployments.
    pub tenant_id: Option<String>,
    pub dispatcher: DispatcherSettings,
    pub orchestrator: OrchestratorSettings,
    pub commands: CommandsConfig,
    pub modules: ModulesConfig,
    pub views: ViewsConfig,
    pub clients: ClientsConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_concurrency: self.dispatcher.permits,
            delay: DelayPolicy {
                ceiling_secs: self.dispatcher.max_delay_secs,
                throttle_step_secs: self.dispatcher.throttle_step_secs,
                decay_step_secs: self.dispatcher.decay_step_secs,
            },
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            stagger: self.orchestrator.stagger,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatcherSettings {
    pub permits: usize,
    pub max_delay_secs: f64,
    pub throttle_step_secs: f64,
    pub decay_step_secs: f64,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        let defaults = DispatcherConfig::default();
        Self {
            permits: defaults.max_concurrency,
            max_delay_secs: defaults.delay.ceiling_secs,
            throttle_step_secs: defaults.delay.throttle_step_secs,
            decay_step_secs: defaults.delay.decay_step_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub stagger: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            stagger: OrchestratorConfig::default().stagger,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandsConfig {
    /// `None` leaves the decision to the operator at startup.
    pub global_sync: Option<bool>,
    pub mirror_scope_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulesConfig {
    /// Feature modules to load; empty loads the whole catalog.
    pub enabled: Vec<String>,
    /// Modules only loaded in development and alpha deployments.
    pub experimental: Vec<String>,
    /// Module loaded after all others.
    pub hot_reload: String,
}

impl ModulesConfig {
    pub fn is_experimental(&self, name: &str) -> bool {
        self.experimental.iter().any(|candidate| candidate == name)
    }
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            enabled: Vec::new(),
            experimental: vec!["staff_conduct".to_string()],
            hot_reload: "hot_reload".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewsConfig {
    pub store_path: PathBuf,
    /// JSON directory of tenant records; isolated deployments need one.
    pub tenants_path: Option<PathBuf>,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("data/views.json"),
            tenants_path: None,
        }
    }
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientsConfig {
    pub request_timeout: Duration,
    /// Uptime monitor pinged by the statistics job.
    pub heartbeat_url: Option<Url>,
}

impl Default for ClientsConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            heartbeat_url: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
