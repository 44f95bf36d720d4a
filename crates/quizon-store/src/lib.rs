//! # quizon-store
//!
//! SQLite persistence for Quizon users, backed by rusqlite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for the user table:
//! lookup, reconciliation (find-or-create keyed on the unique
//! `telegram_id`), whitelisted profile patches, and the economy mutations
//! whose level/win-rate rules are applied here, server-side, never trusted
//! from client input.

pub mod database;
pub mod migrations;
pub mod reconcile;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
