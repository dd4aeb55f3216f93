use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;
use warden_core::{
    DispatchError, EndpointClass, RateLimitedDispatcher,
    dispatch::{CallFailure, HttpStatusFailure, ThrottleSignal},
    lifecycle::ports::ClientPool,
};

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("HTTP client pool is not warmed")]
    NotWarmed,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Status(#[from] HttpStatusFailure),
}

impl ThrottleSignal for UpstreamError {
    fn classify(&self) -> CallFailure {
        match self {
            UpstreamError::Status(failure) => failure.classify(),
            UpstreamError::NotWarmed | UpstreamError::Network(_) => CallFailure::Other,
        }
    }
}

/// Shared `reqwest` client whose every call goes through the dispatcher.
pub struct HttpClientPool {
    dispatcher: Arc<RateLimitedDispatcher>,
    timeout: Duration,
    client: RwLock<Option<reqwest::Client>>,
}

impl fmt::Debug for HttpClientPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientPool")
            .field("timeout", &self.timeout)
            .field("warmed", &self.is_warmed())
            .finish()
    }
}

impl HttpClientPool {
    pub fn new(dispatcher: Arc<RateLimitedDispatcher>, timeout: Duration) -> Self {
        Self {
            dispatcher,
            timeout,
            client: RwLock::new(None),
        }
    }

    pub fn is_warmed(&self) -> bool {
        self.client.read().is_some()
    }

    fn client(&self) -> Result<reqwest::Client, UpstreamError> {
        self.client.read().clone().ok_or(UpstreamError::NotWarmed)
    }

    /// GETs `url` and discards the body.
    pub async fn ping(
        &self,
        endpoint: &EndpointClass,
        url: Url,
    ) -> Result<(), DispatchError<UpstreamError>> {
        let client = self.client().map_err(DispatchError::Upstream)?;
        self.dispatcher
            .dispatch(endpoint, || async move {
                let response = client.get(url).send().await?;
                check_status(response).await?;
                Ok::<_, UpstreamError>(())
            })
            .await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    #[derive(Debug, Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        message: Option<String>,
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| format!("request failed with status {status}"));

    Err(UpstreamError::Status(HttpStatusFailure::with_retry_after_header(
        status.as_u16(),
        retry_after.as_deref(),
        message,
    )))
}

#[async_trait]
impl ClientPool for HttpClientPool {
    async fn warm(&self) -> anyhow::Result<()> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("warden/", env!("CARGO_PKG_VERSION")))
            .build()?;
        *self.client.write() = Some(client);
        info!(timeout = ?self.timeout, "HTTP client pool ready");
        Ok(())
    }

    async fn close(&self) {
        if self.client.write().take().is_some() {
            debug!("HTTP client pool released");
        }
    }
}
