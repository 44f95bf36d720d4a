//! # quizon-client
//!
//! Client-side session management for the Quizon mini-app.
//!
//! The [`SessionContext`] owns the authentication state machine
//! (`unauthenticated -> authenticating -> authenticated | error`), talks
//! to the API server through an [`AuthBackend`], and keeps the last
//! authenticated user in a local cache so a fresh launch can render
//! immediately.  A cached identity is never treated as re-verified; any
//! trust-changing path goes through the server gateway again.

pub mod backend;
pub mod cache;
pub mod session;

pub use backend::{AuthBackend, HttpAuthBackend, LoginOutcome};
pub use cache::SessionCache;
pub use session::{AuthStatus, SessionContext};
