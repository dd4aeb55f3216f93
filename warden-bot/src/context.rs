use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use warden_config::Config;
use warden_core::{RateLimitedDispatcher, ViewRouter};

use crate::infra::http::HttpClientPool;

/// Process-wide state handed to background jobs and rehydrated views.
///
/// This is the owner reference persisted views point at with their owner
/// slot.
#[derive(Clone)]
pub struct BotContext {
    config: Arc<Config>,
    dispatcher: Arc<RateLimitedDispatcher>,
    router: Arc<ViewRouter>,
    http: Arc<HttpClientPool>,
    started_at: DateTime<Utc>,
}

impl fmt::Debug for BotContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotContext")
            .field("environment", &self.config.environment)
            .field("bound_views", &self.router.len())
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl BotContext {
    pub fn new(
        config: Arc<Config>,
        dispatcher: Arc<RateLimitedDispatcher>,
        router: Arc<ViewRouter>,
        http: Arc<HttpClientPool>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            router,
            http,
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<RateLimitedDispatcher> {
        &self.dispatcher
    }

    pub fn router(&self) -> &Arc<ViewRouter> {
        &self.router
    }

    pub fn http(&self) -> &Arc<HttpClientPool> {
        &self.http
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}
