//! Worker lifecycle: install, activate, fetch, hand-over

pub mod registration;
pub mod state;
pub mod worker;

pub use registration::{RegisterOutcome, Registration};
pub use state::WorkerState;
pub use worker::{passthrough, Worker, WorkerOptions};
