//! Visibility-aware polling scheduler.
//!
//! Runs a caller-supplied asynchronous refresh operation on a fixed
//! interval without wasting work while the display surface is hidden, and
//! coalesces "refresh shortly after a mutation" requests.
//!
//! # Architecture
//!
//! - [`state`]: the Idle/Active/Paused session machine as pure transition
//!   functions, independently testable.
//! - [`visibility`]: the page-visibility boolean as a subscribable signal.
//! - [`scheduler`]: the live session, a spawned task multiplexing the
//!   interval, visibility changes, and caller commands, torn down through a
//!   cancellation token so no stale timer or listener survives a restart.

pub mod scheduler;
pub mod state;
pub mod visibility;

pub use scheduler::{PollConfig, PollError, PollScheduler, Refresh};
pub use state::{step, Effect, PollEvent, PollState};
pub use visibility::VisibilitySignal;
