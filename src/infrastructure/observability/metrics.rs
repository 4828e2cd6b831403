//! Action metrics
//!
//! Recorded through the `metrics` facade; without an installed recorder the
//! macros are no-ops, so embedding applications choose the exporter.

use std::time::Duration;

use metrics::{counter, histogram};

/// Record one pipeline run; `outcome` is `success` or the error kind
pub fn record_action(action: &'static str, outcome: &'static str, duration: Duration) {
    counter!("team_actions_total", "action" => action, "outcome" => outcome).increment(1);
    histogram!("team_action_duration_seconds", "action" => action)
        .record(duration.as_secs_f64());
}

/// Record a failed sub-action or cache invalidation
pub fn record_side_effect_failure(action: &'static str, sub_action: &str) {
    counter!(
        "team_side_effect_failures_total",
        "action" => action,
        "sub_action" => sub_action.to_string()
    )
    .increment(1);
}
