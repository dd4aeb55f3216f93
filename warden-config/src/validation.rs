use thiserror::Error;
use warden_core::{DeploymentMode, dispatch::MAX_DELAY_SECS};

use super::models::Config;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigGuardRailError {
    #[error("dispatcher permits must be at least 1")]
    ZeroPermits,
    #[error("invalid dispatcher delay policy: {reason}")]
    InvalidDelayPolicy { reason: String },
    #[error(
        "{mode} deployments require CUSTOM_GUILD_ID (or `tenant_id` in the config file)"
    )]
    MissingTenantId { mode: DeploymentMode },
    #[error("orchestrator stagger must be shorter than {max:?}")]
    StaggerTooLong { max: std::time::Duration },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

const MAX_STAGGER: std::time::Duration = std::time::Duration::from_secs(60 * 60);

pub fn apply_guard_rails(config: &Config) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    validate_dispatcher(config)?;

    if config.environment.requires_tenant() && config.tenant_id.is_none() {
        return Err(ConfigGuardRailError::MissingTenantId {
            mode: config.environment,
        });
    }
    if !config.environment.requires_tenant() && config.tenant_id.is_some() {
        warnings.push(format!(
            "CUSTOM_GUILD_ID is set but ignored in {} deployments",
            config.environment
        ));
    }
    if config.environment.requires_tenant() && config.views.tenants_path.is_none() {
        warnings.push_with_hint(
            "No tenant directory configured; tenant lookup will find nothing",
            "Set TENANTS_PATH or `views.tenants_path` to a JSON file of tenant records",
        );
    }

    if config.orchestrator.stagger >= MAX_STAGGER {
        return Err(ConfigGuardRailError::StaggerTooLong { max: MAX_STAGGER });
    }
    if config.orchestrator.stagger.is_zero() {
        warnings.push_with_hint(
            "Orchestrator stagger is zero; every background job starts at once",
            "Set JOB_STAGGER (e.g. `30s`) to spread job startup",
        );
    }

    if config.commands.global_sync.is_none() {
        warnings.push_with_hint(
            "GLOBAL_SYNC not set; the operator will be asked at startup",
            "Pass --global-sync/--no-global-sync or set GLOBAL_SYNC for unattended starts",
        );
    }

    if !config.environment.allows_experimental() {
        for name in config
            .modules
            .enabled
            .iter()
            .filter(|name| config.modules.is_experimental(name))
        {
            warnings.push(format!(
                "Module `{name}` is experimental and will be skipped in {} deployments",
                config.environment
            ));
        }
    }

    Ok(warnings)
}

fn validate_dispatcher(config: &Config) -> Result<(), ConfigGuardRailError> {
    let settings = &config.dispatcher;
    if settings.permits == 0 {
        return Err(ConfigGuardRailError::ZeroPermits);
    }

    let invalid = |reason: &str| ConfigGuardRailError::InvalidDelayPolicy {
        reason: reason.to_string(),
    };
    if !settings.max_delay_secs.is_finite() || settings.max_delay_secs <= 0.0 {
        return Err(invalid("max_delay_secs must be a positive number"));
    }
    if settings.max_delay_secs > MAX_DELAY_SECS {
        return Err(invalid("max_delay_secs must not exceed 5 seconds"));
    }
    if !settings.throttle_step_secs.is_finite() || settings.throttle_step_secs <= 0.0 {
        return Err(invalid("throttle_step_secs must be a positive number"));
    }
    if !settings.decay_step_secs.is_finite() || settings.decay_step_secs <= 0.0 {
        return Err(invalid("decay_step_secs must be a positive number"));
    }
    if settings.throttle_step_secs > settings.max_delay_secs {
        return Err(invalid("throttle_step_secs exceeds max_delay_secs"));
    }
    Ok(())
}
