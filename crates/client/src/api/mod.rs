//! Campus API fetch client.
//!
//! HTTP access to the Campus REST backend with uniform failure handling:
//!
//! - bearer-token injection from a [`SessionStore`]
//! - status classification (401 terminates the session, 429 retries with
//!   backoff, everything else surfaces once)
//! - every outcome delivered as an [`Envelope`]; callers branch on
//!   `data`/`error`, never on exceptions
//!
//! # Architecture
//!
//! - The session is a capability passed into the client, not a global; tests
//!   inject fake stores.
//! - Retry counts and backoff come from `campus_common::resilience`; which
//!   statuses retry is decided here.
//! - Multipart bodies are buffered ([`FormPayload`]) so a rate-limited
//!   upload can be rebuilt and retried.

pub mod client;
pub mod envelope;
pub mod errors;
pub mod session;

pub use client::{ApiClient, ApiClientBuilder, FormPayload, Payload, RequestOptions};
pub use envelope::Envelope;
pub use errors::{ApiError, ApiErrorCategory, CONNECTION_ERROR, SESSION_EXPIRED};
pub use session::{LayeredSessionStore, MemorySessionStore, SessionStore};
