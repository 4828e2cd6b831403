//! Action pipeline vocabulary
//!
//! The types every mutating operation speaks: who is acting, how failures
//! are classified, what a finished operation reports back, and the
//! follow-up work it schedules after commit.

mod context;
mod error;
mod outcome;
mod sub_action;

pub use context::{ActionContext, Actor};
pub use error::{ActionError, ConflictCode, FieldErrors};
pub use outcome::{ActionOutcome, SideEffectWarning};
pub use sub_action::SubAction;
