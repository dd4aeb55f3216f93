use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{MessageId, ViewId};
use crate::error::ViewError;

/// Marker the legacy store uses in place of the owning process reference.
pub const OWNER_SENTINEL: &str = "SELF";

/// One persisted view record.
///
/// `args` never contains the owner reference itself; `owner_slot` records the
/// position it held in the original constructor call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedView {
    pub id: ViewId,
    pub view_type: String,
    pub message_id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_slot: Option<usize>,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl PersistedView {
    /// Decodes a raw store document (`_id`, `view_type`, `message_id`,
    /// `args`), turning the owner sentinel into `owner_slot`.
    pub fn from_document(doc: &Value) -> Result<Self, ViewError> {
        let id = match doc.get("_id") {
            Some(Value::String(id)) => ViewId(id.clone()),
            Some(Value::Object(map)) => match map.get("$oid") {
                Some(Value::String(oid)) => ViewId(oid.clone()),
                _ => return Err(malformed_doc("`_id` object has no `$oid`")),
            },
            Some(Value::Number(n)) => ViewId(n.to_string()),
            _ => return Err(malformed_doc("missing `_id`")),
        };

        let view_type = doc
            .get("view_type")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed(&id, "missing `view_type`"))?
            .to_string();

        let message_id = doc
            .get("message_id")
            .and_then(snowflake)
            .ok_or_else(|| malformed(&id, "missing or invalid `message_id`"))?;

        let raw_args: &[Value] = match doc.get("args") {
            Some(Value::Array(items)) => items.as_slice(),
            None | Some(Value::Null) => &[],
            Some(_) => return Err(malformed(&id, "`args` is not a list")),
        };

        let mut owner_slot = None;
        let mut args = Vec::with_capacity(raw_args.len());
        for (index, item) in raw_args.iter().enumerate() {
            if item.as_str() == Some(OWNER_SENTINEL) {
                if owner_slot.is_some() {
                    return Err(malformed(&id, "owner reference appears more than once"));
                }
                owner_slot = Some(index);
            } else {
                args.push(item.clone());
            }
        }

        Ok(Self {
            id,
            view_type,
            message_id,
            owner_slot,
            args,
        })
    }

    /// Substitutes the live owner for the owner slot.
    pub fn resolve<C>(&self, owner: &Arc<C>) -> ResolvedArgs<C> {
        ResolvedArgs {
            owner: self.owner_slot.map(|_| Arc::clone(owner)),
            values: self.args.clone(),
        }
    }
}

/// Constructor arguments with the owner reference resolved.
#[derive(Debug)]
pub struct ResolvedArgs<C> {
    pub owner: Option<Arc<C>>,
    pub values: Vec<Value>,
}

impl<C> ResolvedArgs<C> {
    /// Reads the nested `expiry` at `position`.
    ///
    /// `Ok(None)` when the argument exists but is not an object (it carries no
    /// expiry); an error when the position is missing or the object has no
    /// usable `expiry`.
    pub fn expiry_at(&self, position: usize) -> Result<Option<DateTime<Utc>>, String> {
        let value = self
            .values
            .get(position)
            .ok_or_else(|| format!("expected an argument at position {position}"))?;
        let Value::Object(map) = value else {
            return Ok(None);
        };
        let raw = map
            .get("expiry")
            .ok_or_else(|| format!("argument {position} has no `expiry`"))?;
        let secs = raw
            .as_f64()
            .ok_or_else(|| format!("argument {position} has a non-numeric `expiry`"))?;
        timestamp(secs)
            .map(Some)
            .ok_or_else(|| format!("argument {position} has an out-of-range `expiry`"))
    }
}

/// Accepts ids stored as numbers or as numeric strings.
pub(crate) fn snowflake(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Converts epoch seconds to a timestamp, rounding to the millisecond.
pub(crate) fn timestamp(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let millis = (secs * 1000.0).round();
    if millis < i64::MIN as f64 || millis > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

fn malformed(id: &ViewId, reason: &str) -> ViewError {
    ViewError::Malformed {
        id: id.clone(),
        reason: reason.to_string(),
    }
}

fn malformed_doc(reason: &str) -> ViewError {
    malformed(&ViewId("<unknown>".to_string()), reason)
}
