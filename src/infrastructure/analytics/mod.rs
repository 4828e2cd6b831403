//! Read-only team statistics

mod service;

pub use service::{AnalyticsService, GlobalAnalytics, TeamAnalytics};
