use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::JobSpec;
use crate::{
    clock::{Clock, TokioClock},
    mode::DeploymentMode,
};

/// Knobs for the staggered start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Pause inserted before every job start except the first.
    pub stagger: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stagger: Duration::from_secs(30),
        }
    }
}

/// One step of a start plan: which job, and how long to wait before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStart {
    pub index: usize,
    pub name: String,
    pub delay_before: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub name: String,
    pub error: String,
}

/// What a single `start_all` run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestrationReport {
    pub started: Vec<String>,
    pub failed: Vec<JobFailure>,
    /// Jobs disabled for the current deployment mode.
    pub disabled: Vec<String>,
    /// Jobs left alone because an earlier run already started them.
    pub already_started: Vec<String>,
    pub cancelled: bool,
}

struct JobSlot {
    spec: JobSpec,
    started: AtomicBool,
}

impl JobSlot {
    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

/// Starts an ordered list of background jobs one at a time.
///
/// Each job after the first waits out the stagger pause before it starts. A
/// job that is disabled for the deployment mode is left out of the plan
/// entirely, pause included. Started flags survive across runs, so calling
/// [`start_all`](Self::start_all) again only starts what has not been started
/// yet.
pub struct TaskOrchestrator {
    slots: Vec<JobSlot>,
    config: OrchestratorConfig,
    mode: DeploymentMode,
    clock: Arc<dyn Clock>,
    run_lock: Mutex<()>,
}

impl fmt::Debug for TaskOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let started = self.slots.iter().filter(|slot| slot.is_started()).count();
        f.debug_struct("TaskOrchestrator")
            .field("jobs", &self.slots.len())
            .field("started", &started)
            .field("config", &self.config)
            .field("mode", &self.mode)
            .field("clock", &self.clock)
            .finish()
    }
}

impl TaskOrchestrator {
    pub fn new(jobs: Vec<JobSpec>, config: OrchestratorConfig, mode: DeploymentMode) -> Self {
        Self::with_clock(jobs, config, mode, Arc::new(TokioClock))
    }

    pub fn with_clock(
        jobs: Vec<JobSpec>,
        config: OrchestratorConfig,
        mode: DeploymentMode,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let slots = jobs
            .into_iter()
            .map(|spec| JobSlot {
                spec,
                started: AtomicBool::new(false),
            })
            .collect();
        Self {
            slots,
            config,
            mode,
            clock,
            run_lock: Mutex::new(()),
        }
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.slots.iter().map(|slot| slot.spec.name.as_str()).collect()
    }

    pub fn is_started(&self, name: &str) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.spec.name == name && slot.is_started())
    }

    pub fn started_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_started()).count()
    }

    /// The `(job, delay before start)` sequence the next run would follow.
    pub fn plan(&self) -> Vec<PlannedStart> {
        let mut plan: Vec<PlannedStart> = Vec::new();
        for (index, slot) in self.slots.iter().enumerate() {
            if !slot.spec.is_enabled(self.mode) || slot.is_started() {
                continue;
            }
            let delay_before = if plan.is_empty() {
                Duration::ZERO
            } else {
                self.config.stagger
            };
            plan.push(PlannedStart {
                index,
                name: slot.spec.name.clone(),
                delay_before,
            });
        }
        plan
    }

    /// Total pause time the next run would spend between starts.
    pub fn planned_duration(&self) -> Duration {
        self.plan().iter().map(|step| step.delay_before).sum()
    }

    /// Starts every enabled job that has not been started yet, in order.
    ///
    /// A failing start is logged and does not hold up the rest. Cancelling
    /// `cancel` stops the run before the next start; jobs already started
    /// stay marked.
    pub async fn start_all(&self, cancel: &CancellationToken) -> OrchestrationReport {
        let _run = self.run_lock.lock().await;

        let mut report = OrchestrationReport::default();
        for slot in &self.slots {
            if !slot.spec.is_enabled(self.mode) {
                report.disabled.push(slot.spec.name.clone());
            } else if slot.is_started() {
                report.already_started.push(slot.spec.name.clone());
            }
        }

        let plan = self.plan();
        info!(
            jobs = plan.len(),
            mode = %self.mode,
            stagger_secs = self.config.stagger.as_secs_f64(),
            "Starting tasks..."
        );

        for step in plan {
            if !step.delay_before.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        break;
                    }
                    _ = self.clock.sleep(step.delay_before) => {}
                }
            } else if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let slot = &self.slots[step.index];
            match slot.spec.job.start().await {
                Ok(()) => {
                    slot.started.store(true, Ordering::Release);
                    info!(job = %step.name, "Started background job");
                    report.started.push(step.name);
                }
                Err(err) => {
                    error!(job = %step.name, error = %err, "Failed to start background job");
                    report.failed.push(JobFailure {
                        name: step.name,
                        error: err.to_string(),
                    });
                }
            }
        }

        if report.cancelled {
            warn!(
                started = report.started.len(),
                "Background job startup cancelled"
            );
        } else {
            info!(
                started = report.started.len(),
                failed = report.failed.len(),
                "All tasks are now running!"
            );
        }
        report
    }

    /// Forgets which jobs were started so the next run starts them again.
    pub fn reset(&self) {
        for slot in &self.slots {
            slot.started.store(false, Ordering::Release);
        }
    }

    /// Stops every started job's schedule and clears its started flag.
    pub async fn stop_all(&self) {
        let _run = self.run_lock.lock().await;
        for slot in self.slots.iter().rev() {
            if slot.started.swap(false, Ordering::AcqRel) {
                slot.spec.job.stop().await;
                info!(job = %slot.spec.name, "Stopped background job");
            }
        }
    }
}
