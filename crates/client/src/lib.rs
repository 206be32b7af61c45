//! # Campus client core
//!
//! The engineered core of the Campus school-management front-end:
//!
//! - [`api`]: a resilient fetch client for the Campus REST API. Attaches
//!   bearer tokens from a [`api::SessionStore`], classifies responses,
//!   retries rate-limited calls with backoff, and reports every outcome as a
//!   uniform [`api::Envelope`] instead of raising errors.
//! - [`poll`]: a visibility-aware polling scheduler. Runs a caller-supplied
//!   refresh callback on an interval, pauses while the display surface is
//!   hidden, refreshes immediately on return to visibility, and coalesces
//!   "refresh shortly after a mutation" requests.
//!
//! The two components do not depend on each other; pages compose them by
//! handing the scheduler a refresh callback that calls the client.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod api;
pub mod config;
pub mod poll;
