mod common;

use std::{collections::HashSet, sync::Arc};

use serde_json::json;
use warden_core::{
    BootError, Clock, DeploymentMode, JobSpec, LifecycleCoordinator, ManualClock,
    TaskOrchestrator, TokioClock, ViewRouter, ViewStateRehydrator,
    jobs::OrchestratorConfig,
    lifecycle::{
        BootOutcome, BootPorts, CommandSyncPolicy, LifecycleSettings,
        ports::{CommandSyncScope, ModuleDescriptor, TenantRecord},
    },
    views::LeaveNoticeBlueprint,
};

use common::{
    EventLog, FakeClients, FakeCommands, FakeModules, FakePersistence, FakeTenants,
    MemoryViewStore, RecordingJob,
};

const MIRROR_SCOPE: u64 = 1_403_328_821_121_388_674;

#[derive(Debug)]
struct Bot;

struct Harness {
    mode: DeploymentMode,
    tenant_id: Option<String>,
    tenants: Vec<TenantRecord>,
    modules: Vec<ModuleDescriptor>,
    broken_modules: HashSet<String>,
    global_sync: bool,
    store: Arc<MemoryViewStore>,
    clock: Arc<dyn Clock>,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            mode: DeploymentMode::Production,
            tenant_id: None,
            tenants: Vec::new(),
            modules: vec![
                ModuleDescriptor::new("infractions"),
                ModuleDescriptor::new("hot_reload"),
                ModuleDescriptor::new("shifts"),
            ],
            broken_modules: HashSet::new(),
            global_sync: true,
            store: Arc::new(MemoryViewStore::default()),
            clock: Arc::new(ManualClock::default()),
        }
    }
}

struct Booted {
    coordinator: LifecycleCoordinator<Bot>,
    log: EventLog,
    jobs: Vec<Arc<RecordingJob>>,
    router: Arc<ViewRouter>,
}

impl Harness {
    fn build(self) -> Booted {
        let log = EventLog::default();
        let jobs: Vec<_> = ["check_reminders", "check_leave_notices", "change_status"]
            .into_iter()
            .map(|name| RecordingJob::new(name, self.clock.clone(), log.clone()))
            .collect();
        let specs = jobs
            .iter()
            .map(|job| {
                let spec = JobSpec::new(job.clone());
                if spec.name == "change_status" {
                    spec.skip_in(DeploymentMode::Isolated)
                } else {
                    spec
                }
            })
            .collect();
        let orchestrator = Arc::new(TaskOrchestrator::with_clock(
            specs,
            OrchestratorConfig::default(),
            self.mode,
            self.clock.clone(),
        ));

        let router = Arc::new(ViewRouter::new());
        let rehydrator = ViewStateRehydrator::new(self.store.clone(), router.clone())
            .with_clock(self.clock.clone())
            .register(Arc::new(LeaveNoticeBlueprint));

        let ports = BootPorts {
            persistence: Arc::new(FakePersistence {
                log: log.clone(),
                fail_connect: false,
            }),
            tenants: Arc::new(FakeTenants {
                log: log.clone(),
                known: self.tenants,
            }),
            clients: Arc::new(FakeClients { log: log.clone() }),
            modules: Arc::new(FakeModules {
                log: log.clone(),
                available: self.modules,
                broken: self.broken_modules,
            }),
            commands: Arc::new(FakeCommands { log: log.clone() }),
        };

        let settings = LifecycleSettings {
            mode: self.mode,
            tenant_id: self.tenant_id,
            collections: vec!["views".into(), "settings".into(), "consent".into()],
            hot_reload_module: "hot_reload".into(),
            command_sync: CommandSyncPolicy {
                global: self.global_sync,
                mirror_scope_id: MIRROR_SCOPE,
            },
        };

        Booted {
            coordinator: LifecycleCoordinator::new(settings, ports, orchestrator, rehydrator),
            log,
            jobs,
            router,
        }
    }
}

#[tokio::test]
async fn duplicate_boot_triggers_run_the_sequence_once() {
    let Booted {
        coordinator, log, ..
    } = Harness::default().build();

    let first = coordinator.boot(Arc::new(Bot)).await.expect("boot");
    let second = coordinator.boot(Arc::new(Bot)).await.expect("second boot");

    assert!(matches!(first, BootOutcome::Ready(_)));
    assert_eq!(second, BootOutcome::AlreadyInitialized);
    assert!(coordinator.is_ready());
    assert_eq!(log.count("persistence:connect"), 1);
    assert_eq!(log.count("commands:global"), 1);
    assert_eq!(coordinator.command_sync_scope(), Some(CommandSyncScope::Global));
}

#[tokio::test]
async fn steps_run_in_boot_order() {
    let Booted {
        coordinator, log, ..
    } = Harness::default().build();

    coordinator.boot(Arc::new(Bot)).await.expect("boot");

    let order = [
        "persistence:connect",
        "persistence:bind:3",
        "clients:warm",
        "modules:discover",
        "load:infractions",
        "load:shifts",
        "load:hot_reload",
        "commands:global",
    ]
    .map(|event| log.position(event).unwrap_or_else(|| panic!("missing {event}")));
    assert!(order.windows(2).all(|pair| pair[0] < pair[1]), "{:?}", log.events());
}

#[tokio::test]
async fn isolated_mode_without_tenant_record_aborts() {
    let Booted {
        coordinator, log, ..
    } = Harness {
        mode: DeploymentMode::Isolated,
        tenant_id: Some("42".into()),
        ..Harness::default()
    }
    .build();

    let err = coordinator
        .boot(Arc::new(Bot))
        .await
        .expect_err("missing tenant is fatal");

    assert!(matches!(err, BootError::TenantMissing { ref tenant_id } if tenant_id == "42"));
    assert!(!coordinator.is_initialized());
    assert_eq!(log.count("modules:discover"), 0);
    assert_eq!(log.count("clients:warm"), 0);
}

#[tokio::test]
async fn isolated_mode_without_tenant_id_aborts() {
    let Booted { coordinator, .. } = Harness {
        mode: DeploymentMode::Isolated,
        tenant_id: Some("  ".into()),
        ..Harness::default()
    }
    .build();

    let err = coordinator.boot(Arc::new(Bot)).await.expect_err("fatal");
    assert!(matches!(err, BootError::TenantMissing { .. }));
}

#[tokio::test]
async fn isolated_mode_with_tenant_record_boots() {
    let Booted {
        coordinator, log, ..
    } = Harness {
        mode: DeploymentMode::Isolated,
        tenant_id: Some("42".into()),
        tenants: vec![TenantRecord {
            tenant_id: "42".into(),
            attributes: json!({"plan": "whitelabel"}),
        }],
        ..Harness::default()
    }
    .build();

    let outcome = coordinator.boot(Arc::new(Bot)).await.expect("boot");
    let BootOutcome::Ready(report) = outcome else {
        panic!("expected a fresh boot");
    };

    assert_eq!(report.tenant.map(|t| t.tenant_id).as_deref(), Some("42"));
    assert_eq!(log.count("tenant:42"), 1);

    let orchestration = coordinator.join_orchestration().await.expect("joined");
    assert_eq!(orchestration.disabled, vec!["change_status"]);
}

#[tokio::test]
async fn experimental_modules_follow_the_deployment_mode() {
    let modules = vec![
        ModuleDescriptor::new("infractions"),
        ModuleDescriptor::experimental("staff_conduct"),
    ];

    let production = Harness {
        modules: modules.clone(),
        ..Harness::default()
    }
    .build();
    let BootOutcome::Ready(report) = production
        .coordinator
        .boot(Arc::new(Bot))
        .await
        .expect("boot")
    else {
        panic!("expected a fresh boot");
    };
    assert_eq!(report.modules.skipped, vec!["staff_conduct"]);
    assert_eq!(production.log.count("load:staff_conduct"), 0);

    let development = Harness {
        mode: DeploymentMode::Development,
        modules,
        ..Harness::default()
    }
    .build();
    development
        .coordinator
        .boot(Arc::new(Bot))
        .await
        .expect("boot");
    assert_eq!(development.log.count("load:staff_conduct"), 1);
}

#[tokio::test]
async fn one_broken_module_does_not_stop_the_rest() {
    let Booted {
        coordinator, log, ..
    } = Harness {
        modules: vec![
            ModuleDescriptor::new("infractions"),
            ModuleDescriptor::new("broken"),
            ModuleDescriptor::new("shifts"),
        ],
        broken_modules: HashSet::from(["broken".to_string()]),
        ..Harness::default()
    }
    .build();

    let BootOutcome::Ready(report) = coordinator.boot(Arc::new(Bot)).await.expect("boot") else {
        panic!("expected a fresh boot");
    };

    assert_eq!(report.modules.loaded, vec!["infractions", "shifts", "hot_reload"]);
    assert_eq!(report.modules.failed.len(), 1);
    assert_eq!(report.modules.failed[0].name, "broken");
    assert_eq!(log.count("load:shifts"), 1);
}

#[tokio::test]
async fn declined_global_sync_mirrors_into_default_scope() {
    let Booted {
        coordinator, log, ..
    } = Harness {
        global_sync: false,
        ..Harness::default()
    }
    .build();

    coordinator.boot(Arc::new(Bot)).await.expect("boot");

    assert_eq!(log.count("commands:global"), 0);
    assert_eq!(log.count(&format!("commands:mirror:{MIRROR_SCOPE}")), 1);
    assert_eq!(
        coordinator.command_sync_scope(),
        Some(CommandSyncScope::Mirrored {
            scope_id: MIRROR_SCOPE
        })
    );
}

#[tokio::test]
async fn stored_views_are_bound_before_ready() {
    let store = MemoryViewStore::from_documents(&[json!({
        "_id": "menu",
        "view_type": "LOAMenu",
        "message_id": 555,
        "args": ["SELF", [], 9, "notice"],
    })]);
    let Booted {
        coordinator,
        router,
        ..
    } = Harness {
        store,
        ..Harness::default()
    }
    .build();

    coordinator.boot(Arc::new(Bot)).await.expect("boot");

    assert!(coordinator.is_ready());
    assert!(router.view_for(555).is_some());
}

#[tokio::test]
async fn rehydration_failure_aborts_and_allows_retry() {
    let Booted {
        coordinator, log, ..
    } = Harness {
        store: MemoryViewStore::broken(),
        ..Harness::default()
    }
    .build();

    let err = coordinator.boot(Arc::new(Bot)).await.expect_err("fatal");
    assert!(matches!(err, BootError::Rehydration(_)));
    assert!(!coordinator.is_initialized());
    assert!(!coordinator.is_ready());

    let _ = coordinator.boot(Arc::new(Bot)).await;
    assert_eq!(log.count("persistence:connect"), 2);
    // The sync decision is kept from the first attempt.
    assert_eq!(log.count("commands:global"), 1);
}

#[tokio::test]
async fn background_jobs_start_after_boot_and_stop_on_shutdown() {
    let Booted {
        coordinator,
        log,
        jobs,
        ..
    } = Harness::default().build();

    coordinator.boot(Arc::new(Bot)).await.expect("boot");
    let report = coordinator.join_orchestration().await.expect("joined");
    assert_eq!(report.started.len(), 3);
    for job in &jobs {
        assert_eq!(job.start_count(), 1);
    }

    coordinator.shutdown().await;

    assert!(!coordinator.is_ready());
    assert_eq!(coordinator.orchestrator().started_count(), 0);
    let events = log.events();
    let tail: Vec<_> = events.iter().rev().take(5).rev().cloned().collect();
    assert_eq!(
        tail,
        vec![
            "stop:change_status",
            "stop:check_leave_notices",
            "stop:check_reminders",
            "clients:close",
            "persistence:close",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_a_staggered_startup() {
    let Booted {
        coordinator, jobs, ..
    } = Harness {
        clock: Arc::new(TokioClock),
        ..Harness::default()
    }
    .build();

    coordinator.boot(Arc::new(Bot)).await.expect("boot");
    assert!(coordinator.is_ready());

    // Give the spawned run a chance to start the first job and begin its pause.
    tokio::task::yield_now().await;
    coordinator.shutdown().await;

    let started: usize = jobs.iter().map(|job| job.start_count()).sum();
    assert!(started < jobs.len());
    assert_eq!(coordinator.orchestrator().started_count(), 0);
}

#[tokio::test]
async fn shutdown_during_rehydration_leaves_the_bot_unready() {
    let store = Arc::new(MemoryViewStore {
        gated: true,
        ..MemoryViewStore::default()
    });
    let Booted {
        coordinator, log, ..
    } = Harness {
        store: store.clone(),
        ..Harness::default()
    }
    .build();

    let interrupt = async {
        store.entered.notified().await;
        coordinator.shutdown().await;
        store.release.notify_one();
    };
    let (result, ()) = tokio::join!(coordinator.boot(Arc::new(Bot)), interrupt);

    assert!(matches!(result, Err(BootError::ShutdownRequested)));
    assert!(!coordinator.is_ready());
    assert!(!coordinator.is_initialized());
    assert_eq!(log.count("persistence:close"), 1);
}
