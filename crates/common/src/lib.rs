//! Generic utilities shared across Campus crates.
//!
//! Currently this crate carries the resilience primitives (backoff and retry
//! configuration) used by the API fetch client. Keep modules here generic:
//! nothing in this crate may know about HTTP status codes, sessions, or
//! polling semantics.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;
