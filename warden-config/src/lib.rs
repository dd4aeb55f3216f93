//! Configuration loading for Warden.
//!
//! Values come from three layers: an optional `warden.toml`, a `.env` file,
//! and the process environment. Environment values win over the file and the
//! file wins over built-in defaults. The loaded [`Config`] is validated
//! before it is returned; problems that do not prevent startup are reported
//! as [`ConfigWarnings`].

#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError};
pub use models::{
    ClientsConfig, CommandsConfig, Config, ConfigMetadata, DEFAULT_MIRROR_SCOPE_ID, DatabaseConfig,
    DispatcherSettings, ModulesConfig, OrchestratorSettings, ViewsConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
