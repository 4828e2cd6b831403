//! Notification delivery adapters

mod factory;
mod log;
mod webhook;

pub use factory::NotifierFactory;
pub use log::LogNotifier;
pub use webhook::WebhookNotifier;
