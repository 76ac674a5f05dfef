//! Authenticated API client with single-flight credential renewal
//!
//! Wraps a `Transport` so that every outbound call carries the current access
//! token, and a 401 is absorbed by renewing the credential pair once and
//! replaying the call. Concurrent 401s share one renewal. A failed renewal
//! clears the stored session and notifies whoever registered through
//! `SessionClient::on_session_invalidated`.
//!
//! Call lifecycle:
//! 1. `attach::attach_bearer()` adds `Authorization: Bearer <access>`
//! 2. The transport performs the call; `transport::classify()` sorts the outcome
//! 3. A 401 on a fresh call goes to `RefreshCoordinator::renew()`; the first
//!    caller drives the renewal, the rest queue behind it
//! 4. With a new token the call is re-issued once, marked so it cannot renew again
//! 5. Anything else (including a second 401) is returned to the caller

pub mod attach;
pub mod client;
pub mod coordinator;
pub mod error;
mod metrics;
pub mod signal;

#[cfg(test)]
mod testing;

pub use attach::attach_bearer;
pub use client::SessionClient;
pub use coordinator::{RefreshCoordinator, RefreshError};
pub use error::{Error, Result};
pub use signal::{InvalidationSignal, SessionInvalidated};
