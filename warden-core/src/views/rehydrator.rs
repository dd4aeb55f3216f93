use std::{collections::HashMap, fmt, sync::Arc};

use tracing::{debug, info, warn};

use super::{PersistedView, ViewBinder, ViewBlueprint, ViewId, ViewStore};
use crate::{
    clock::{Clock, TokioClock},
    error::ViewError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub id: ViewId,
    pub view_type: String,
    pub error: String,
}

/// Outcome of one rehydration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RehydrationReport {
    pub scanned: usize,
    pub restored: usize,
    /// Records past their expiry, deleted from the store.
    pub expired: usize,
    /// Records whose `view_type` has no blueprint; left untouched.
    pub unknown: usize,
    pub failed: Vec<RecordFailure>,
}

enum Restored {
    Bound,
    Expired,
}

/// Rebuilds persisted views and binds them back to their messages.
pub struct ViewStateRehydrator<C> {
    store: Arc<dyn ViewStore>,
    binder: Arc<dyn ViewBinder>,
    blueprints: HashMap<&'static str, Arc<dyn ViewBlueprint<C>>>,
    clock: Arc<dyn Clock>,
}

impl<C> fmt::Debug for ViewStateRehydrator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut view_types: Vec<_> = self.blueprints.keys().collect();
        view_types.sort();
        f.debug_struct("ViewStateRehydrator")
            .field("view_types", &view_types)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl<C: Send + Sync + 'static> ViewStateRehydrator<C> {
    pub fn new(store: Arc<dyn ViewStore>, binder: Arc<dyn ViewBinder>) -> Self {
        Self {
            store,
            binder,
            blueprints: HashMap::new(),
            clock: Arc::new(TokioClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn register(mut self, blueprint: Arc<dyn ViewBlueprint<C>>) -> Self {
        self.blueprints.insert(blueprint.view_type(), blueprint);
        self
    }

    /// Scans every stored record once.
    ///
    /// Only a failure to list the store is returned as an error; problems
    /// with individual records are logged and collected in the report.
    pub async fn rehydrate(&self, owner: &Arc<C>) -> Result<RehydrationReport, ViewError> {
        let records = self.store.list_all().await?;
        let mut report = RehydrationReport {
            scanned: records.len(),
            ..RehydrationReport::default()
        };

        for record in records {
            let Some(blueprint) = self.blueprints.get(record.view_type.as_str()) else {
                debug!(id = %record.id, view_type = %record.view_type, "skipping view of unknown type");
                report.unknown += 1;
                continue;
            };

            match self.restore(&record, blueprint.as_ref(), owner).await {
                Ok(Restored::Bound) => report.restored += 1,
                Ok(Restored::Expired) => report.expired += 1,
                Err(err) => {
                    warn!(
                        id = %record.id,
                        view_type = %record.view_type,
                        error = %err,
                        "failed to rehydrate view"
                    );
                    report.failed.push(RecordFailure {
                        id: record.id.clone(),
                        view_type: record.view_type.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            scanned = report.scanned,
            restored = report.restored,
            expired = report.expired,
            unknown = report.unknown,
            failed = report.failed.len(),
            "view rehydration finished"
        );
        Ok(report)
    }

    async fn restore(
        &self,
        record: &PersistedView,
        blueprint: &dyn ViewBlueprint<C>,
        owner: &Arc<C>,
    ) -> Result<Restored, ViewError> {
        if record.owner_slot != blueprint.owner_slot() {
            return Err(ViewError::Malformed {
                id: record.id.clone(),
                reason: format!(
                    "owner reference at {:?}, expected {:?}",
                    record.owner_slot,
                    blueprint.owner_slot()
                ),
            });
        }
        let args = record.resolve(owner);

        if let Some(position) = blueprint.expiry_position() {
            let expiry = args.expiry_at(position).map_err(|reason| ViewError::Malformed {
                id: record.id.clone(),
                reason,
            })?;
            if let Some(expiry) = expiry
                && expiry < self.clock.now()
            {
                self.store.delete_by_id(&record.id).await?;
                debug!(id = %record.id, %expiry, "deleted expired view");
                return Ok(Restored::Expired);
            }
        }

        let view = blueprint
            .build(args)
            .map_err(|reason| ViewError::Malformed {
                id: record.id.clone(),
                reason,
            })?;
        self.binder.bind(record.message_id, view);
        Ok(Restored::Bound)
    }
}
