//! Observability infrastructure - action metrics

mod metrics;

pub use metrics::{record_action, record_side_effect_failure};
