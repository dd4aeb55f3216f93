mod common;

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use warden_core::{
    Clock, DeploymentMode, JobSpec, ManualClock, TaskOrchestrator, TokioClock,
    jobs::OrchestratorConfig,
};

use common::{EventLog, RecordingJob};

const STAGGER: Duration = Duration::from_secs(30);

fn orchestrator(jobs: Vec<JobSpec>, mode: DeploymentMode, clock: &ManualClock) -> TaskOrchestrator {
    TaskOrchestrator::with_clock(
        jobs,
        OrchestratorConfig { stagger: STAGGER },
        mode,
        Arc::new(clock.clone()),
    )
}

#[tokio::test]
async fn jobs_start_in_order_with_stagger_between_them() {
    let clock = ManualClock::new(Utc::now());
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let log = EventLog::default();
    let a = RecordingJob::new("A", shared.clone(), log.clone());
    let b = RecordingJob::new("B", shared.clone(), log.clone());
    let c = RecordingJob::new("C", shared.clone(), log.clone());

    let orchestrator = orchestrator(
        vec![
            JobSpec::new(a.clone()),
            JobSpec::new(b.clone()),
            JobSpec::new(c.clone()),
        ],
        DeploymentMode::Production,
        &clock,
    );

    let report = orchestrator.start_all(&CancellationToken::new()).await;

    assert_eq!(report.started, vec!["A", "B", "C"]);
    assert_eq!(log.events(), vec!["start:A", "start:B", "start:C"]);

    let (a, b, c) = (
        a.first_start().expect("A started"),
        b.first_start().expect("B started"),
        c.first_start().expect("C started"),
    );
    assert!(b - a >= chrono::Duration::seconds(30));
    assert!(c - b >= chrono::Duration::seconds(30));
    assert_eq!(clock.sleeps(), vec![STAGGER, STAGGER]);
}

#[tokio::test]
async fn disabled_job_drops_its_pause() {
    let clock = ManualClock::default();
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let log = EventLog::default();
    let jobs = || {
        vec![
            JobSpec::new(RecordingJob::new("A", shared.clone(), log.clone())),
            JobSpec::new(RecordingJob::new("change_status", shared.clone(), log.clone()))
                .skip_in(DeploymentMode::Isolated),
            JobSpec::new(RecordingJob::new("C", shared.clone(), log.clone())),
        ]
    };

    let full = orchestrator(jobs(), DeploymentMode::Production, &clock);
    let isolated = orchestrator(jobs(), DeploymentMode::Isolated, &clock);
    assert_eq!(
        full.planned_duration() - isolated.planned_duration(),
        STAGGER
    );

    let report = isolated.start_all(&CancellationToken::new()).await;

    assert_eq!(report.started, vec!["A", "C"]);
    assert_eq!(report.disabled, vec!["change_status"]);
    assert_eq!(clock.sleeps(), vec![STAGGER]);
    assert!(!isolated.is_started("change_status"));
}

#[tokio::test]
async fn second_run_starts_nothing_twice() {
    let clock = ManualClock::default();
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let log = EventLog::default();
    let jobs: Vec<_> = ["A", "B", "C"]
        .into_iter()
        .map(|name| RecordingJob::new(name, shared.clone(), log.clone()))
        .collect();
    let orchestrator = orchestrator(
        jobs.iter().map(|job| JobSpec::new(job.clone())).collect(),
        DeploymentMode::Development,
        &clock,
    );

    let token = CancellationToken::new();
    orchestrator.start_all(&token).await;
    let second = orchestrator.start_all(&token).await;

    for job in &jobs {
        assert_eq!(job.start_count(), 1);
    }
    assert!(second.started.is_empty());
    assert_eq!(second.already_started, vec!["A", "B", "C"]);
    assert_eq!(clock.sleeps().len(), 2);
    assert!(orchestrator.plan().is_empty());
}

#[tokio::test]
async fn failing_start_does_not_block_later_jobs() {
    let clock = ManualClock::default();
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let log = EventLog::default();
    let orchestrator = orchestrator(
        vec![
            JobSpec::new(RecordingJob::new("A", shared.clone(), log.clone())),
            JobSpec::new(RecordingJob::failing("B", shared.clone(), log.clone())),
            JobSpec::new(RecordingJob::new("C", shared.clone(), log.clone())),
        ],
        DeploymentMode::Production,
        &clock,
    );

    let report = orchestrator.start_all(&CancellationToken::new()).await;

    assert_eq!(report.started, vec!["A", "C"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "B");
    assert!(report.failed[0].error.contains("loop refused to start"));

    // Only the failed job is still pending.
    let plan = orchestrator.plan();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].name, "B");
    assert_eq!(plan[0].delay_before, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_before_the_next_start() {
    let log = EventLog::default();
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let jobs: Vec<_> = ["A", "B", "C"]
        .into_iter()
        .map(|name| RecordingJob::new(name, clock.clone(), log.clone()))
        .collect();
    let orchestrator = Arc::new(TaskOrchestrator::new(
        jobs.iter().map(|job| JobSpec::new(job.clone())).collect(),
        OrchestratorConfig::default(),
        DeploymentMode::Production,
    ));

    let token = CancellationToken::new();
    let run = {
        let orchestrator = Arc::clone(&orchestrator);
        let token = token.clone();
        tokio::spawn(async move { orchestrator.start_all(&token).await })
    };

    tokio::time::sleep(Duration::from_secs(10)).await;
    token.cancel();
    let report = run.await.expect("orchestration task");

    assert!(report.cancelled);
    assert_eq!(report.started, vec!["A"]);

    // A fresh run picks up where the cancelled one stopped.
    let resumed = orchestrator.start_all(&CancellationToken::new()).await;
    assert_eq!(resumed.started, vec!["B", "C"]);
    assert_eq!(resumed.already_started, vec!["A"]);
    assert_eq!(jobs[0].start_count(), 1);
}

#[tokio::test]
async fn stop_all_runs_in_reverse_and_clears_flags() {
    let clock = ManualClock::default();
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let log = EventLog::default();
    let orchestrator = orchestrator(
        vec![
            JobSpec::new(RecordingJob::new("A", shared.clone(), log.clone())),
            JobSpec::new(RecordingJob::new("B", shared.clone(), log.clone())),
        ],
        DeploymentMode::Alpha,
        &clock,
    );

    orchestrator.start_all(&CancellationToken::new()).await;
    assert_eq!(orchestrator.started_count(), 2);

    orchestrator.stop_all().await;

    assert_eq!(orchestrator.started_count(), 0);
    let events = log.events();
    assert_eq!(&events[2..], ["stop:B", "stop:A"]);
}
