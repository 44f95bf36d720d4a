//! # quizon-shared
//!
//! Domain core for the Quizon mini-app: verification and parsing of
//! Telegram WebApp init data, the user model with its game-economy
//! invariants, and the flat authentication error taxonomy shared by the
//! server and the client.
//!
//! Everything in this crate is pure and synchronous.  The HTTP boundary
//! lives in `quizon-server`, persistence in `quizon-store`.

pub mod constants;
pub mod init_data;
pub mod user;
pub mod verify;

mod error;

pub use error::AuthError;
pub use init_data::{TelegramIdentity, VerifiedInitData};
pub use user::{AppUser, UserPatch, UserSettings};
pub use verify::verify_and_parse;
