//! # Warden Bot
//!
//! Process wiring for the Warden moderation bot: configuration, logging,
//! local adapters for the collaborator ports of [`warden_core`], the
//! background job catalog, and signal-driven shutdown.

pub mod app;
pub mod context;
pub mod infra;
pub mod jobs;
pub mod shutdown;

pub use app::App;
pub use context::BotContext;
