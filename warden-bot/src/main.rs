//! # Warden
//!
//! Community-moderation bot process.
//!
//! Loads configuration, boots the coordination layer (persistence, tenant
//! check, feature modules, command sync, staggered background jobs, view
//! rehydration), then runs until Ctrl+C or SIGTERM and shuts down in order.

use std::{io::IsTerminal, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use dialoguer::Confirm;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_bot::{App, shutdown::wait_for_shutdown};
use warden_config::{ConfigLoad, ConfigLoader, ConfigLoaderOptions};
use warden_core::lifecycle::BootOutcome;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(about = "Community-moderation bot")]
struct Cli {
    /// Path to warden.toml (overrides WARDEN_CONFIG_PATH)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a .env file to load before reading the environment
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Synchronize commands globally without asking
    #[arg(long, conflicts_with = "no_global_sync")]
    global_sync: bool,

    /// Mirror commands into the fixed scope instead of syncing globally
    #[arg(long)]
    no_global_sync: bool,
}

impl Cli {
    fn global_sync(&self) -> Option<bool> {
        match (self.global_sync, self.no_global_sync) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let ConfigLoad { config, warnings } = ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: cli.config.clone(),
        env_file: cli.env_file.clone(),
    })
    .load()
    .context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,warden_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file in effect");
    }
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => warn!(message = %warning.message, hint = %hint, "configuration warning"),
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }

    info!(
        environment = %config.environment,
        dispatcher.permits = config.dispatcher.permits,
        dispatcher.max_delay_secs = config.dispatcher.max_delay_secs,
        orchestrator.stagger = ?config.orchestrator.stagger,
        "configuration in effect"
    );

    let global_sync = decide_global_sync(cli.global_sync().or(config.commands.global_sync)).await?;

    let app = App::build(config, global_sync);
    match app.boot().await {
        Ok(BootOutcome::Ready(report)) => {
            info!(
                tenant = report.tenant.as_ref().map(|t| t.tenant_id.as_str()),
                modules_loaded = report.modules.loaded.len(),
                modules_failed = report.modules.failed.len(),
                modules_skipped = report.modules.skipped.len(),
                command_sync = ?report.command_sync,
                views_restored = report.rehydration.restored,
                views_expired = report.rehydration.expired,
                "Warden is ready"
            );
        }
        Ok(BootOutcome::AlreadyInitialized) => {}
        Err(err) => {
            error!(error = %err, "boot failed");
            app.shutdown().await;
            return Err(err).context("boot failed");
        }
    }

    wait_for_shutdown().await;
    info!("shutdown signal received");
    app.shutdown().await;
    Ok(())
}

/// Falls back to asking the operator when neither the CLI nor configuration
/// decided, and to mirroring when nobody can be asked.
async fn decide_global_sync(decided: Option<bool>) -> anyhow::Result<bool> {
    if let Some(global) = decided {
        return Ok(global);
    }
    if !std::io::stdin().is_terminal() {
        warn!("command sync undecided and no terminal to ask; mirroring commands");
        return Ok(false);
    }

    let answer = tokio::task::spawn_blocking(|| {
        Confirm::new()
            .with_prompt("Do you want to globally sync commands to all servers?")
            .default(false)
            .interact()
    })
    .await
    .context("command sync prompt task failed")?
    .context("failed to read command sync answer")?;
    Ok(answer)
}
