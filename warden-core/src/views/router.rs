use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;

use super::{InteractiveView, MessageId, ViewBinder};

/// In-memory registry of live views keyed by the message they are bound to.
#[derive(Default)]
pub struct ViewRouter {
    views: RwLock<HashMap<MessageId, Arc<dyn InteractiveView>>>,
}

impl fmt::Debug for ViewRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRouter")
            .field("bound_views", &self.views.read().len())
            .finish()
    }
}

impl ViewRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view_for(&self, message_id: MessageId) -> Option<Arc<dyn InteractiveView>> {
        self.views.read().get(&message_id).cloned()
    }

    /// The view that should receive an interaction with `component_id` on
    /// `message_id`, if any.
    pub fn route(
        &self,
        message_id: MessageId,
        component_id: &str,
    ) -> Option<Arc<dyn InteractiveView>> {
        self.view_for(message_id).filter(|view| {
            view.component_ids()
                .iter()
                .any(|candidate| candidate == component_id)
        })
    }

    pub fn remove(&self, message_id: MessageId) -> Option<Arc<dyn InteractiveView>> {
        self.views.write().remove(&message_id)
    }

    pub fn len(&self) -> usize {
        self.views.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.read().is_empty()
    }
}

impl ViewBinder for ViewRouter {
    fn bind(&self, message_id: MessageId, view: Arc<dyn InteractiveView>) {
        self.views.write().insert(message_id, view);
    }
}
