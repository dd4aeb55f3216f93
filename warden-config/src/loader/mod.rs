pub mod error;

use once_cell::sync::Lazy;
use std::{fs, path::PathBuf, str::FromStr, time::Duration};
use tracing::debug;
use url::Url;
use warden_core::DeploymentMode;

use super::{
    models::{
        ClientsConfig, CommandsConfig, Config, ConfigMetadata, DEFAULT_MIRROR_SCOPE_ID, DatabaseConfig,
        DispatcherSettings, ModulesConfig, OrchestratorSettings, ViewsConfig,
        sources::{EnvConfig, FileConfig},
    },
    validation::{self, ConfigWarnings},
};
use error::ConfigLoadError;

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("warden.toml"),
        PathBuf::from("config/warden.toml"),
    ]
});

const DEFAULT_DATABASE_NAME: &str = "erm";

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Loads `.env` into the process environment, then resolves the config.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigLoadError::MissingEnvFile { path: path.clone() });
                }
                dotenvy::from_path(path)?;
                true
            }
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        self.resolve(EnvConfig::gather(), env_file_loaded)
    }

    /// Resolves the config from an already gathered environment.
    pub fn load_with_env(&self, env: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        self.resolve(env, false)
    }

    fn resolve(&self, env: EnvConfig, env_file_loaded: bool) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) =
            self.compose_config(file_config, env, config_path, env_file_loaded)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = if let Some(explicit) = &self.options.config_path {
            (explicit.clone(), true)
        } else if let Some(from_env) = &env_config.config_path {
            (from_env.clone(), true)
        } else if let Some(default) = DEFAULT_CONFIG_LOCATIONS
            .iter()
            .find(|candidate| candidate.exists())
        {
            (default.clone(), false)
        } else {
            return Ok((None, None));
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents = fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
            path: path.clone(),
            source: err,
        })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;
        debug!(path = %path.display(), "loaded configuration file");

        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
        env_file_loaded: bool,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No warden.toml detected; falling back to environment variables",
                "Create warden.toml or point WARDEN_CONFIG_PATH at one",
            );
        }

        let FileConfig {
            environment: file_environment,
            tenant_id: file_tenant_id,
            database: file_database,
            dispatcher: file_dispatcher,
            orchestrator: file_orchestrator,
            commands: file_commands,
            modules: file_modules,
            views: file_views,
            clients: file_clients,
        } = file_config.unwrap_or_default();

        let environment = match env.environment.as_deref() {
            Some(raw) => parse_mode("ENVIRONMENT", raw)?,
            None => match file_environment.as_deref() {
                Some(raw) => parse_mode("environment", raw)?,
                None => DeploymentMode::default(),
            },
        };

        let database = DatabaseConfig {
            url: resolve_database_url(env.mongo_url.clone().or(file_database.url))?,
            name: env
                .database_name
                .clone()
                .or(file_database.name)
                .unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string()),
        };

        let tenant_id = env
            .tenant_id
            .clone()
            .or(file_tenant_id)
            .filter(|value| !value.trim().is_empty());

        let defaults = DispatcherSettings::default();
        let dispatcher = DispatcherSettings {
            permits: match env.dispatcher_permits.as_deref() {
                Some(raw) => parse_value("DISPATCHER_PERMITS", raw)?,
                None => file_dispatcher.permits.unwrap_or(defaults.permits),
            },
            max_delay_secs: file_dispatcher
                .max_delay_secs
                .unwrap_or(defaults.max_delay_secs),
            throttle_step_secs: file_dispatcher
                .throttle_step_secs
                .unwrap_or(defaults.throttle_step_secs),
            decay_step_secs: file_dispatcher
                .decay_step_secs
                .unwrap_or(defaults.decay_step_secs),
        };

        let orchestrator = OrchestratorSettings {
            stagger: match (env.job_stagger.as_deref(), file_orchestrator.stagger.as_deref()) {
                (Some(raw), _) => parse_duration("JOB_STAGGER", raw)?,
                (None, Some(raw)) => parse_duration("orchestrator.stagger", raw)?,
                (None, None) => OrchestratorSettings::default().stagger,
            },
        };

        let global_sync = match env.global_sync() {
            Ok(Some(value)) => Some(value),
            Ok(None) => file_commands.global_sync,
            Err(value) => {
                return Err(ConfigLoadError::InvalidValue {
                    key: "GLOBAL_SYNC",
                    value,
                    reason: "expected a yes/no value".to_string(),
                });
            }
        };
        let commands = CommandsConfig {
            global_sync,
            mirror_scope_id: match env.mirror_scope_id.as_deref() {
                Some(raw) => parse_value("COMMAND_MIRROR_SCOPE_ID", raw)?,
                None => file_commands
                    .mirror_scope_id
                    .unwrap_or(DEFAULT_MIRROR_SCOPE_ID),
            },
        };

        let module_defaults = ModulesConfig::default();
        let modules = ModulesConfig {
            enabled: env
                .enabled_modules
                .clone()
                .or(file_modules.enabled)
                .unwrap_or(module_defaults.enabled),
            experimental: env
                .experimental_modules
                .clone()
                .or(file_modules.experimental)
                .unwrap_or(module_defaults.experimental),
            hot_reload: env
                .hot_reload_module
                .clone()
                .or(file_modules.hot_reload)
                .unwrap_or(module_defaults.hot_reload),
        };

        let views = ViewsConfig {
            store_path: env
                .view_store_path
                .clone()
                .or(file_views.store_path)
                .unwrap_or_else(|| ViewsConfig::default().store_path),
            tenants_path: env.tenants_path.clone().or(file_views.tenants_path),
        };

        let clients = ClientsConfig {
            request_timeout: match (env.http_timeout.as_deref(), file_clients.request_timeout.as_deref()) {
                (Some(raw), _) => parse_duration("HTTP_TIMEOUT", raw)?,
                (None, Some(raw)) => parse_duration("clients.request_timeout", raw)?,
                (None, None) => ClientsConfig::default().request_timeout,
            },
            heartbeat_url: match (env.heartbeat_url.as_deref(), file_clients.heartbeat_url.as_deref()) {
                (Some(raw), _) => Some(parse_http_url("HEARTBEAT_URL", raw)?),
                (None, Some(raw)) => Some(parse_http_url("clients.heartbeat_url", raw)?),
                (None, None) => None,
            },
        };

        let config = Config {
            environment,
            database,
            tenant_id,
            dispatcher,
            orchestrator,
            commands,
            modules,
            views,
            clients,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        };

        let guard_warnings = validation::apply_guard_rails(&config)?;
        warnings.extend(guard_warnings);

        Ok((config, warnings))
    }
}

fn resolve_database_url(raw: Option<String>) -> Result<String, ConfigLoadError> {
    let raw = raw
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigLoadError::MissingValue { key: "MONGO_URL" })?;
    let parsed =
        Url::parse(&raw).map_err(|source| ConfigLoadError::InvalidDatabaseUrl { source })?;
    match parsed.scheme() {
        "mongodb" | "mongodb+srv" => Ok(raw),
        other => Err(ConfigLoadError::UnsupportedDatabaseScheme {
            scheme: other.to_string(),
        }),
    }
}

fn parse_http_url(key: &'static str, raw: &str) -> Result<Url, ConfigLoadError> {
    let invalid = |reason: String| ConfigLoadError::InvalidValue {
        key,
        value: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|err| invalid(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme `{other}`"))),
    }
}

fn parse_mode(key: &'static str, raw: &str) -> Result<DeploymentMode, ConfigLoadError> {
    DeploymentMode::from_str(raw).map_err(|err| ConfigLoadError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigLoadError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err: T::Err| ConfigLoadError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: err.to_string(),
        })
}

fn parse_duration(key: &'static str, raw: &str) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim()).map_err(|err| ConfigLoadError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
