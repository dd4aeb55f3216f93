//! Background job catalog, in boot order.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};
use warden_core::{DeploymentMode, EndpointClass, JobSpec, jobs::IntervalJob};

use crate::context::BotContext;

/// Collections bound right after the persistence layer connects.
pub const DEFAULT_COLLECTIONS: &[&str] = &[
    "shift_management",
    "errors",
    "leave_of_absences",
    "reminders",
    "custom_commands",
    "analytics",
    "punishment_types",
    "custom_flags",
    "views",
    "api_tokens",
    "link_strings",
    "fivem_links",
    "consent",
    "settings",
    "server_keys",
    "staff_connections",
    "logged_command_data",
    "actions",
    "prohibited_keys",
    "saved_logs",
    "pending_oauth2",
    "oauth2",
];

const HEARTBEAT: EndpointClass = EndpointClass::from_static("heartbeat");

pub fn default_collections() -> Vec<String> {
    DEFAULT_COLLECTIONS.iter().map(|name| name.to_string()).collect()
}

/// Every background job the bot runs.
///
/// `change_status` rotates the shared bot presence, which isolated
/// deployments do not own.
pub fn job_catalog(ctx: &Arc<BotContext>) -> Vec<JobSpec> {
    let periodic = |name: &'static str, period: Duration| {
        let ctx = Arc::clone(ctx);
        JobSpec::new(Arc::new(IntervalJob::new(name, period, move || {
            let ctx = Arc::clone(&ctx);
            async move {
                debug!(job = name, bound_views = ctx.router().len(), "job tick");
                Ok(())
            }
        })))
    };

    vec![
        periodic("check_reminders", Duration::from_secs(60)),
        periodic("check_leave_notices", Duration::from_secs(60)),
        periodic("iterate_integration_commands", Duration::from_secs(60)),
        periodic("iterate_server_logs", Duration::from_secs(120)),
        statistics_check(ctx),
        periodic("tempban_checks", Duration::from_secs(300)),
        periodic("check_whitelisted_vehicles", Duration::from_secs(300)),
        periodic("change_status", Duration::from_secs(600)).skip_in(DeploymentMode::Isolated),
        periodic("process_scheduled_messages", Duration::from_secs(60)),
        periodic("sync_weather", Duration::from_secs(600)),
        periodic("iterate_conditions", Duration::from_secs(120)),
        periodic("check_infractions", Duration::from_secs(300)),
        periodic("server_automations", Duration::from_secs(60)),
        periodic("partner_discord_checks", Duration::from_secs(300)),
    ]
}

/// Reports process health and pings the uptime monitor, if one is set.
fn statistics_check(ctx: &Arc<BotContext>) -> JobSpec {
    let ctx = Arc::clone(ctx);
    JobSpec::new(Arc::new(IntervalJob::new(
        "statistics_check",
        Duration::from_secs(60),
        move || {
            let ctx = Arc::clone(&ctx);
            async move {
                let dispatcher = ctx.dispatcher();
                info!(
                    uptime_secs = ctx.uptime().num_seconds(),
                    bound_views = ctx.router().len(),
                    permits_free = dispatcher.available_permits(),
                    permits_total = dispatcher.capacity(),
                    heartbeat_delay_secs = dispatcher.delay_for(&HEARTBEAT),
                    "statistics"
                );

                let Some(url) = ctx.config().clients.heartbeat_url.clone() else {
                    return Ok(());
                };
                if let Err(err) = ctx.http().ping(&HEARTBEAT, url).await {
                    warn!(error = %err, retryable = err.is_retryable(), "heartbeat ping failed");
                }
                Ok(())
            }
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collections_cover_the_view_store() {
        let collections = default_collections();
        assert_eq!(collections.len(), 22);
        assert!(collections.iter().any(|name| name == "views"));
    }
}
