use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;
use warden_core::lifecycle::ports::{CommandRegistry, CommandSyncScope};

/// Command registry that records where commands were synchronized to.
#[derive(Debug, Default)]
pub struct LoggingCommandRegistry {
    last_sync: Mutex<Option<CommandSyncScope>>,
}

impl LoggingCommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sync(&self) -> Option<CommandSyncScope> {
        *self.last_sync.lock()
    }
}

#[async_trait]
impl CommandRegistry for LoggingCommandRegistry {
    async fn sync_global(&self) -> anyhow::Result<()> {
        info!("synchronizing commands globally");
        *self.last_sync.lock() = Some(CommandSyncScope::Global);
        Ok(())
    }

    async fn mirror_global_into(&self, scope_id: u64) -> anyhow::Result<()> {
        info!(scope_id, "mirroring global commands into scope");
        *self.last_sync.lock() = Some(CommandSyncScope::Mirrored { scope_id });
        Ok(())
    }
}
