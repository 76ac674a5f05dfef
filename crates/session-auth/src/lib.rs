//! Session credentials and auth endpoint calls
//!
//! Owns the signed-in principal and its access/refresh token pair, persists
//! them through a pluggable `CredentialStorage`, and speaks the auth endpoint
//! family (`/auth/login`, `/auth/register`, `/auth/refresh`, `/auth/logout`).
//! This crate has no knowledge of the request path or of renewal
//! coordination; `session-client` builds those on top.
//!
//! Credential flow:
//! 1. `token::login()` or `token::register()` returns an `AuthResponse`
//! 2. The full record is stored via `CredentialStore::save()`
//! 3. On a 401 the coordinator calls `token::refresh_tokens()` once
//! 4. Renewed tokens land via `CredentialStore::rotate_tokens()`
//! 5. Logout or a failed renewal ends in `CredentialStore::clear()`

pub mod constants;
pub mod credentials;
pub mod error;
pub mod storage;
pub mod token;

pub use constants::*;
pub use credentials::{CredentialStore, Credentials, Principal};
pub use error::{Error, Result};
pub use storage::{CredentialStorage, FileStorage, MemoryStorage, StoredCredentials};
pub use token::{AuthResponse, TokenBundle, TokenGrant, login, logout, refresh_tokens, register};
