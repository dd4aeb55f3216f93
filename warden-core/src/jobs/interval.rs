use std::{fmt, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{FutureExt, future::BoxFuture};
use parking_lot::Mutex;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::BackgroundJob;
use crate::error::JobError;

type TickFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Job that runs `tick` every `period` on its own tokio task.
///
/// The first tick fires as soon as the job is started. A failing tick is
/// logged and the loop keeps going.
pub struct IntervalJob {
    name: String,
    period: Duration,
    tick: TickFn,
    running: Mutex<Option<RunningLoop>>,
}

impl fmt::Debug for IntervalJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalJob")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("running", &self.is_running())
            .finish()
    }
}

impl IntervalJob {
    pub fn new<F, Fut>(name: impl Into<String>, period: Duration, tick: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let tick: TickFn = Arc::new(move || tick().boxed());
        Self {
            name: name.into(),
            period,
            tick,
            running: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }
}

#[async_trait]
impl BackgroundJob for IntervalJob {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), JobError> {
        if self.period.is_zero() {
            return Err(JobError::Start {
                name: self.name.clone(),
                source: anyhow::anyhow!("interval period must be non-zero"),
            });
        }

        let mut running = self.running.lock();
        if running
            .as_ref()
            .is_some_and(|existing| !existing.handle.is_finished())
        {
            return Err(JobError::AlreadyRunning(self.name.clone()));
        }

        let token = CancellationToken::new();
        let loop_token = token.clone();
        let tick = Arc::clone(&self.tick);
        let name = self.name.clone();
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(err) = tick().await {
                            warn!(job = %name, error = %err, "background job iteration failed");
                        }
                    }
                }
            }
            debug!(job = %name, "background job loop exited");
        });

        *running = Some(RunningLoop { token, handle });
        Ok(())
    }

    async fn stop(&self) {
        let running = self.running.lock().take();
        if let Some(RunningLoop { token, handle }) = running {
            token.cancel();
            if let Err(err) = handle.await
                && !err.is_cancelled()
            {
                warn!(job = %self.name, error = %err, "background job loop panicked");
            }
        }
    }
}
