use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Deployment flavour the process was started in.
///
/// `Isolated` is the single-tenant (white-label) deployment: it needs a tenant
/// record before boot can continue and skips jobs that only make sense on the
/// shared instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentMode {
    #[default]
    Development,
    Alpha,
    Production,
    #[serde(alias = "CUSTOM")]
    Isolated,
}

impl DeploymentMode {
    pub const ALL: [DeploymentMode; 4] = [
        DeploymentMode::Development,
        DeploymentMode::Alpha,
        DeploymentMode::Production,
        DeploymentMode::Isolated,
    ];

    /// Whether boot must resolve a tenant record before loading anything.
    pub fn requires_tenant(self) -> bool {
        matches!(self, DeploymentMode::Isolated)
    }

    /// Whether modules flagged experimental are loaded.
    pub fn allows_experimental(self) -> bool {
        matches!(self, DeploymentMode::Development | DeploymentMode::Alpha)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentMode::Development => "DEVELOPMENT",
            DeploymentMode::Alpha => "ALPHA",
            DeploymentMode::Production => "PRODUCTION",
            DeploymentMode::Isolated => "ISOLATED",
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown deployment mode `{0}` (expected DEVELOPMENT, ALPHA, PRODUCTION or ISOLATED)")]
pub struct UnknownDeploymentMode(pub String);

impl FromStr for DeploymentMode {
    type Err = UnknownDeploymentMode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DEVELOPMENT" | "DEV" => Ok(DeploymentMode::Development),
            "ALPHA" => Ok(DeploymentMode::Alpha),
            "PRODUCTION" | "PROD" => Ok(DeploymentMode::Production),
            "ISOLATED" | "CUSTOM" => Ok(DeploymentMode::Isolated),
            _ => Err(UnknownDeploymentMode(raw.to_string())),
        }
    }
}
