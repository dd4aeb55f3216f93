//! Persisted interactive views and their rehydration.
//!
//! Interactive message components (menus, buttons) outlive the process: their
//! constructor arguments are stored next to the id of the message they were
//! attached to. At boot the [`ViewStateRehydrator`] rebuilds each one and
//! binds it back to its message so interactions keep routing to it.

mod menus;
mod record;
mod rehydrator;
mod router;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ViewError;

pub use menus::{LeaveNoticeBlueprint, LeaveNoticeMenu, NoticeRef};
pub use record::{OWNER_SENTINEL, PersistedView, ResolvedArgs};
pub use rehydrator::{RecordFailure, RehydrationReport, ViewStateRehydrator};
pub use router::ViewRouter;

/// Snowflake id of a chat message.
pub type MessageId = u64;

/// Store-assigned id of a persisted view record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewId(pub String);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ViewId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Live interactive object attached to a message.
pub trait InteractiveView: Send + Sync + fmt::Debug {
    fn view_type(&self) -> &str;

    /// Component ids this view answers to.
    fn component_ids(&self) -> Vec<String>;
}

/// Where persisted view records live.
#[async_trait]
pub trait ViewStore: Send + Sync {
    async fn list_all(&self) -> Result<Vec<PersistedView>, ViewError>;

    async fn delete_by_id(&self, id: &ViewId) -> Result<(), ViewError>;
}

/// Registers a live view against the message it belongs to.
pub trait ViewBinder: Send + Sync {
    fn bind(&self, message_id: MessageId, view: Arc<dyn InteractiveView>);
}

/// Reconstructs one view type from resolved arguments.
pub trait ViewBlueprint<C>: Send + Sync {
    /// Value of the record's `view_type` this blueprint handles.
    fn view_type(&self) -> &'static str;

    /// Position the owner reference must hold in the stored argument list,
    /// or `None` when the view takes no owner.
    fn owner_slot(&self) -> Option<usize> {
        Some(0)
    }

    /// Argument position (owner excluded) that may nest an `expiry` timestamp.
    fn expiry_position(&self) -> Option<usize> {
        None
    }

    fn build(&self, args: ResolvedArgs<C>) -> Result<Arc<dyn InteractiveView>, String>;
}
