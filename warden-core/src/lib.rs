//! # Warden Core
//!
//! Concurrency-coordination layer for the Warden community-moderation bot.
//!
//! ## Overview
//!
//! Everything the bot does beyond sequential business logic funnels through
//! four pieces that live here:
//!
//! - **Outbound throttling**: [`dispatch::RateLimitedDispatcher`] bounds
//!   concurrent calls against rate-limited upstreams and adapts a per-endpoint
//!   delay as the upstream pushes back
//! - **Staggered job startup**: [`jobs::TaskOrchestrator`] starts the
//!   long-running background jobs one by one with a fixed pause in between
//! - **View rehydration**: [`views::ViewStateRehydrator`] rebuilds
//!   interactive message components from persisted records after a restart
//! - **Boot lifecycle**: [`lifecycle::LifecycleCoordinator`] composes the
//!   above with the external collaborators into one guarded boot sequence
//!
//! External systems (document store, REST APIs, chat gateway) are reached
//! only through the traits in [`lifecycle::ports`], [`views`], and [`jobs`].
//!
//! ## Time
//!
//! Every component that sleeps does so through a [`clock::Clock`] so tests
//! can drive elapsed time without waiting on the wall clock.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Injectable time source shared by every sleeping component
pub mod clock;

/// Adaptive, concurrency-bounded dispatcher for outbound calls
pub mod dispatch;

/// Error types and error handling utilities
pub mod error;

/// Background job contracts and the staggered start orchestrator
pub mod jobs;

/// Boot sequence and collaborator ports
pub mod lifecycle;

/// Deployment mode resolved once at boot
pub mod mode;

/// Persisted interactive views and their rehydration
pub mod views;

pub use clock::{Clock, ManualClock, TokioClock};
pub use dispatch::{DispatchError, EndpointClass, RateLimitedDispatcher};
pub use error::{BootError, JobError, ModuleError, ViewError};
pub use jobs::{BackgroundJob, JobSpec, TaskOrchestrator};
pub use lifecycle::LifecycleCoordinator;
pub use mode::DeploymentMode;
pub use views::{ViewRouter, ViewStateRehydrator};
