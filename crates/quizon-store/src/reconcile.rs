//! Identity reconciliation: map a verified Telegram identity onto exactly
//! one persisted [`AppUser`].
//!
//! The same entry point serves both trust paths.  The WebApp server calls
//! it with an identity that came out of the HMAC check; the bot calls it
//! with a chat-message sender, which Telegram's transport already vouches
//! for.  Neither path ever creates a second row for a known `telegram_id`:
//! the unique index backstops the read-then-insert race, and an insert
//! conflict is retried once as an update.

use chrono::Utc;
use tracing::{debug, info};

use quizon_shared::{AppUser, TelegramIdentity};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::users;

impl Database {
    /// Find-or-create the user for `identity`.
    ///
    /// Returns the persisted user and whether it was created by this call.
    /// On an existing row, only non-empty incoming fields are merged and
    /// `last_active` is bumped.
    pub fn reconcile(&mut self, identity: &TelegramIdentity) -> Result<(AppUser, bool)> {
        let now = Utc::now();

        if let Some(mut user) = self.find_by_telegram_id(identity.id)? {
            user.merge_identity(identity);
            user.last_active = now;
            self.update_user(&user)?;
            debug!(telegram_id = identity.id, user_id = %user.id, "existing user refreshed");
            return Ok((user, false));
        }

        let user = AppUser::from_identity(identity, now);
        match self.insert_user(&user) {
            Ok(()) => {
                info!(telegram_id = identity.id, user_id = %user.id, "new user created");
                Ok((user, true))
            }
            // Lost the race against a concurrent first login: the row now
            // exists, so retry as an update.
            Err(StoreError::Conflict) => {
                debug!(
                    telegram_id = identity.id,
                    "insert conflicted, retrying as update"
                );
                let mut existing = users::find_by_telegram_id(self.conn(), identity.id)?
                    .ok_or(StoreError::Conflict)?;
                existing.merge_identity(identity);
                existing.last_active = now;
                self.update_user(&existing)?;
                Ok((existing, false))
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: i64) -> TelegramIdentity {
        TelegramIdentity {
            id,
            first_name: "Ana".to_string(),
            last_name: None,
            username: Some("ana_p".to_string()),
            language_code: Some("de".to_string()),
            is_premium: None,
            photo_url: None,
        }
    }

    #[test]
    fn first_login_creates_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open_at(&dir.path().join("test.db")).unwrap();

        let (user, is_new) = db.reconcile(&identity(42)).unwrap();
        assert!(is_new);
        assert_eq!(user.telegram_id, 42);
        assert_eq!(user.coins, 1000);
        assert_eq!(user.xp, 200);
        assert_eq!(user.level, 1);
        assert_eq!(user.total_score, 100);
        assert_eq!(user.settings.language, "de");
    }

    #[test]
    fn reconcile_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open_at(&dir.path().join("test.db")).unwrap();

        let (first, new_first) = db.reconcile(&identity(42)).unwrap();
        let (second, new_second) = db.reconcile(&identity(42)).unwrap();

        assert!(new_first);
        assert!(!new_second);
        assert_eq!(first.id, second.id);
        assert!(second.last_active >= first.last_active);
    }

    #[test]
    fn refresh_merges_only_non_empty_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open_at(&dir.path().join("test.db")).unwrap();
        db.reconcile(&identity(42)).unwrap();

        let mut sparse = identity(42);
        sparse.username = None;
        sparse.first_name = "Anna".to_string();
        sparse.is_premium = Some(true);

        let (user, is_new) = db.reconcile(&sparse).unwrap();
        assert!(!is_new);
        assert_eq!(user.first_name, "Anna");
        assert_eq!(user.username, "ana_p");
        assert!(user.is_premium);
    }

    #[test]
    fn concurrent_first_logins_yield_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        // Create the schema before spawning writers.
        drop(Database::open_at(&path).unwrap());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let path = path.clone();
            handles.push(std::thread::spawn(move || {
                let mut db = Database::open_at(&path).unwrap();
                let (_, is_new) = db.reconcile(&identity(42)).unwrap();
                is_new
            }));
        }

        let creations = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|new| *new)
            .count();
        assert_eq!(creations, 1);

        let db = Database::open_at(&path).unwrap();
        let count: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM users WHERE telegram_id = 42",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
