//! Background job contracts and the staggered start orchestrator.

mod interval;
mod orchestrator;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::JobError, mode::DeploymentMode};

pub use interval::IntervalJob;
pub use orchestrator::{
    JobFailure, OrchestrationReport, OrchestratorConfig, PlannedStart, TaskOrchestrator,
};

/// A long-running job with its own repeating schedule.
///
/// `start` only kicks the schedule off and returns; the job keeps running on
/// its own until `stop` is called or the runtime goes away.
#[async_trait]
pub trait BackgroundJob: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> Result<(), JobError>;

    async fn stop(&self) {}
}

/// Which deployment modes a job runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enablement {
    #[default]
    Always,
    SkipIn(Vec<DeploymentMode>),
    OnlyIn(Vec<DeploymentMode>),
}

impl Enablement {
    pub fn allows(&self, mode: DeploymentMode) -> bool {
        match self {
            Enablement::Always => true,
            Enablement::SkipIn(modes) => !modes.contains(&mode),
            Enablement::OnlyIn(modes) => modes.contains(&mode),
        }
    }
}

/// One entry of the ordered job registry.
#[derive(Clone)]
pub struct JobSpec {
    pub name: String,
    pub job: Arc<dyn BackgroundJob>,
    pub enablement: Enablement,
}

impl fmt::Debug for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSpec")
            .field("name", &self.name)
            .field("enablement", &self.enablement)
            .finish()
    }
}

impl JobSpec {
    pub fn new(job: Arc<dyn BackgroundJob>) -> Self {
        Self {
            name: job.name().to_string(),
            job,
            enablement: Enablement::Always,
        }
    }

    pub fn skip_in(mut self, mode: DeploymentMode) -> Self {
        match &mut self.enablement {
            Enablement::SkipIn(modes) => {
                if !modes.contains(&mode) {
                    modes.push(mode);
                }
            }
            _ => self.enablement = Enablement::SkipIn(vec![mode]),
        }
        self
    }

    pub fn only_in(mut self, modes: Vec<DeploymentMode>) -> Self {
        self.enablement = Enablement::OnlyIn(modes);
        self
    }

    pub fn is_enabled(&self, mode: DeploymentMode) -> bool {
        self.enablement.allows(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enablement_matches_modes() {
        let skip = Enablement::SkipIn(vec![DeploymentMode::Isolated]);
        assert!(skip.allows(DeploymentMode::Production));
        assert!(!skip.allows(DeploymentMode::Isolated));

        let only = Enablement::OnlyIn(vec![DeploymentMode::Development]);
        assert!(only.allows(DeploymentMode::Development));
        assert!(!only.allows(DeploymentMode::Alpha));

        assert!(Enablement::Always.allows(DeploymentMode::Isolated));
    }

    #[test]
    fn spec_builders_set_enablement() {
        let job = || {
            Arc::new(IntervalJob::new(
                "tick",
                std::time::Duration::from_secs(1),
                || async { Ok(()) },
            ))
        };

        let dev_only = JobSpec::new(job()).only_in(vec![DeploymentMode::Development]);
        assert!(dev_only.is_enabled(DeploymentMode::Development));
        assert!(!dev_only.is_enabled(DeploymentMode::Production));

        let skipped = JobSpec::new(job())
            .skip_in(DeploymentMode::Isolated)
            .skip_in(DeploymentMode::Isolated);
        assert_eq!(
            skipped.enablement,
            Enablement::SkipIn(vec![DeploymentMode::Isolated])
        );
        assert!(skipped.is_enabled(DeploymentMode::Alpha));
    }
}
