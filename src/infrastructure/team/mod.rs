//! Team service facade over the action pipeline

mod service;

pub use service::TeamService;
