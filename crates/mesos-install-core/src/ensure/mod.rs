//! Idempotent step execution.
//!
//! Each step is `(guard) -> (action) -> (postcondition)`. Steps are grouped
//! into phases and run through an [`Executor`], which evaluates every guard
//! against the host before invoking the action and records the outcome in a
//! [`RunReport`].

pub mod executor;
pub mod report;
pub mod step;

pub use executor::Executor;
pub use report::{Outcome, RunMode, RunReport, StepRecord};
pub use step::{Change, Guard, Phase, Postcondition, Step};
