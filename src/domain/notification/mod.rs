//! Notification domain module

mod entity;
mod notifier;

pub use entity::{Notification, NotificationKind, Recipient};
pub use notifier::Notifier;
#[cfg(test)]
pub use notifier::MockNotifier;
