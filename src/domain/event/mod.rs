//! Domain events
//!
//! Every committed mutation produces exactly one `DomainEvent`. Events are
//! handed to the bus only after the surrounding commit succeeds.

mod bus;
mod entity;

pub use bus::{EventBus, EventListener};
#[cfg(test)]
pub use bus::{MockEventBus, MockEventListener};
pub use entity::{DomainEvent, EventKind};
