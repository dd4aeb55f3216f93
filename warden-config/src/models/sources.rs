use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::util::{non_empty, parse_bool, parse_csv};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub dispatcher: FileDispatcherConfig,
    #[serde(default)]
    pub orchestrator: FileOrchestratorConfig,
    #[serde(default)]
    pub commands: FileCommandsConfig,
    #[serde(default)]
    pub modules: FileModulesConfig,
    #[serde(default)]
    pub views: FileViewsConfig,
    #[serde(default)]
    pub clients: FileClientsConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDispatcherConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permits: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_step_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decay_step_secs: Option<f64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileOrchestratorConfig {
    /// Human readable duration, e.g. `"30s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stagger: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCommandsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_sync: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_scope_id: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileModulesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hot_reload: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileViewsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenants_path: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileClientsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_url: Option<String>,
}

/// Environment-derived configuration values.
///
/// Values that need parsing are kept raw so a bad value surfaces as a load
/// error naming the variable instead of being silently dropped.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub environment: Option<String>,
    pub mongo_url: Option<String>,
    pub database_name: Option<String>,
    pub tenant_id: Option<String>,
    pub dispatcher_permits: Option<String>,
    pub job_stagger: Option<String>,
    pub global_sync: Option<String>,
    pub mirror_scope_id: Option<String>,
    pub enabled_modules: Option<Vec<String>>,
    pub experimental_modules: Option<Vec<String>>,
    pub hot_reload_module: Option<String>,
    pub view_store_path: Option<PathBuf>,
    pub tenants_path: Option<PathBuf>,
    pub http_timeout: Option<String>,
    pub heartbeat_url: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the environment view from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| non_empty(lookup(key));

        Self {
            config_path: var("WARDEN_CONFIG_PATH").map(PathBuf::from),
            environment: var("ENVIRONMENT"),
            mongo_url: var("MONGO_URL"),
            database_name: var("DATABASE_NAME"),
            tenant_id: var("CUSTOM_GUILD_ID"),
            dispatcher_permits: var("DISPATCHER_PERMITS"),
            job_stagger: var("JOB_STAGGER"),
            global_sync: var("GLOBAL_SYNC"),
            mirror_scope_id: var("COMMAND_MIRROR_SCOPE_ID"),
            enabled_modules: var("ENABLED_MODULES").map(|raw| parse_csv(&raw)),
            experimental_modules: var("EXPERIMENTAL_MODULES").map(|raw| parse_csv(&raw)),
            hot_reload_module: var("HOT_RELOAD_MODULE"),
            view_store_path: var("VIEW_STORE_PATH").map(PathBuf::from),
            tenants_path: var("TENANTS_PATH").map(PathBuf::from),
            http_timeout: var("HTTP_TIMEOUT"),
            heartbeat_url: var("HEARTBEAT_URL"),
        }
    }

    /// `GLOBAL_SYNC` as a boolean, `None` when unset.
    pub fn global_sync(&self) -> Result<Option<bool>, String> {
        self.global_sync
            .as_deref()
            .map(|raw| parse_bool(raw).ok_or_else(|| raw.to_string()))
            .transpose()
    }
}
