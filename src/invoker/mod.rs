//! Invoker: the grading worker loop.
//!
//! A tick loop with a cancellation token, a claim step, and a separate sweeper pass that requeues
//! reports stuck `Running` past a timeout.

mod sweeper;
mod worker;

pub use sweeper::sweep_stuck_reports;
pub use worker::{GradeResult, Grader, Invoker};
