//! Team lifecycle state machine
//!
//! A table of named transitions, each with a source-state set, a target
//! state and the capabilities that unlock it. The machine only evaluates
//! guards and stamps the audit record; the lifecycle actions own persistence.

mod state_machine;

pub use state_machine::{StateMachine, Transition, TransitionError, TransitionName};
