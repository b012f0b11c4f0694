//! Cooperative cancellation for the stage consumer loops.
//!
//! One token is shared by every loop; the process shutdown path cancels
//! it and joins the loops through the task group. Cancellation is
//! cooperative: loops observe the token between polls, and in-flight
//! handler invocations always finish.

mod task_group;
mod token;

pub use task_group::StageTaskGroup;
pub use token::CancellationToken;
