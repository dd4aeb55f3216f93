use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{InteractiveView, ResolvedArgs, ViewBlueprint, record::{snowflake, timestamp}};

/// Reference to the leave notice a review menu acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeRef {
    pub id: String,
    pub expiry: Option<DateTime<Utc>>,
}

/// Accept/deny menu posted for a leave-of-absence request.
pub struct LeaveNoticeMenu<C> {
    pub owner: Arc<C>,
    pub reviewer_role_ids: Vec<u64>,
    pub requester_id: u64,
    pub notice: NoticeRef,
}

impl<C> fmt::Debug for LeaveNoticeMenu<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaveNoticeMenu")
            .field("reviewer_role_ids", &self.reviewer_role_ids)
            .field("requester_id", &self.requester_id)
            .field("notice", &self.notice)
            .finish_non_exhaustive()
    }
}

impl<C: Send + Sync> InteractiveView for LeaveNoticeMenu<C> {
    fn view_type(&self) -> &str {
        LeaveNoticeBlueprint::VIEW_TYPE
    }

    fn component_ids(&self) -> Vec<String> {
        vec![
            format!("{}:accept", LeaveNoticeBlueprint::VIEW_TYPE),
            format!("{}:deny", LeaveNoticeBlueprint::VIEW_TYPE),
        ]
    }
}

/// Rebuilds [`LeaveNoticeMenu`]s.
///
/// Arguments after the owner: reviewer role ids (list or single id), the
/// requester's user id, and the notice (bare id or an object with `_id` and
/// `expiry`).
#[derive(Debug, Default, Clone, Copy)]
pub struct LeaveNoticeBlueprint;

impl LeaveNoticeBlueprint {
    pub const VIEW_TYPE: &'static str = "LOAMenu";
    const ARITY: usize = 3;
    const NOTICE_POSITION: usize = 2;
}

impl<C: Send + Sync + 'static> ViewBlueprint<C> for LeaveNoticeBlueprint {
    fn view_type(&self) -> &'static str {
        Self::VIEW_TYPE
    }

    fn expiry_position(&self) -> Option<usize> {
        Some(Self::NOTICE_POSITION)
    }

    fn build(&self, args: ResolvedArgs<C>) -> Result<Arc<dyn InteractiveView>, String> {
        let ResolvedArgs { owner, values } = args;
        let owner = owner.ok_or("missing owner reference")?;
        if values.len() != Self::ARITY {
            return Err(format!(
                "expected {} arguments after the owner, got {}",
                Self::ARITY,
                values.len()
            ));
        }

        let reviewer_role_ids = match &values[0] {
            Value::Array(items) => items
                .iter()
                .map(|item| snowflake(item).ok_or("reviewer role id is not a snowflake"))
                .collect::<Result<Vec<_>, _>>()?,
            Value::Null => Vec::new(),
            single => vec![snowflake(single).ok_or("reviewer role id is not a snowflake")?],
        };
        let requester_id = snowflake(&values[1]).ok_or("requester id is not a snowflake")?;
        let notice = parse_notice(&values[Self::NOTICE_POSITION])?;

        Ok(Arc::new(LeaveNoticeMenu {
            owner,
            reviewer_role_ids,
            requester_id,
            notice,
        }))
    }
}

fn parse_notice(value: &Value) -> Result<NoticeRef, String> {
    match value {
        Value::String(id) => Ok(NoticeRef {
            id: id.clone(),
            expiry: None,
        }),
        Value::Number(n) => Ok(NoticeRef {
            id: n.to_string(),
            expiry: None,
        }),
        Value::Object(map) => {
            let id = match map.get("_id") {
                Some(Value::String(id)) => id.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Object(inner)) => inner
                    .get("$oid")
                    .and_then(Value::as_str)
                    .ok_or("notice `_id` has no `$oid`")?
                    .to_string(),
                _ => return Err("notice has no `_id`".to_string()),
            };
            let expiry = map
                .get("expiry")
                .and_then(Value::as_f64)
                .and_then(timestamp);
            Ok(NoticeRef { id, expiry })
        }
        _ => Err("notice is neither an id nor an object".to_string()),
    }
}
