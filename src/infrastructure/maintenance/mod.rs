//! Maintenance jobs: invitation expiry, counter repair, inactive team
//! archiving and purging of soft-deleted teams

mod service;

pub use service::{
    ArchiveReport, CounterRepair, InactiveTeam, MaintenanceService, RecountReport,
};
