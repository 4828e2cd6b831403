//! Infrastructure layer - adapters, the action pipeline and services

pub mod action;
pub mod analytics;
pub mod cache;
pub mod events;
pub mod invitation;
pub mod logging;
pub mod maintenance;
pub mod notification;
pub mod observability;
pub mod permission;
pub mod principal;
pub mod storage;
pub mod team;

#[cfg(test)]
pub mod testing;
