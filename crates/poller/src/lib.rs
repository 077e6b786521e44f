//! Calling-side job lifecycle: the status poller and the session that owns
//! the current job.
//!
//! Both work against any [`heartmula_core::backend::JobBackend`].

pub mod poller;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use poller::{CompletedJob, JobPoller, PollOutcome, PollerConfig};
pub use session::{GenerationSession, SessionError};
