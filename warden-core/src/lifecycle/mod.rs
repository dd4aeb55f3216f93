//! Boot sequence and the collaborator ports it drives.

mod coordinator;
pub mod ports;

pub use coordinator::{
    BootOutcome, BootPorts, BootReport, CommandSyncPolicy, LifecycleCoordinator,
    LifecycleSettings, ModuleFailure, ModuleReport,
};
