//! Best-effort local cache of the last authenticated user.
//!
//! The cache exists so a fresh launch can render the profile without
//! waiting for the network round-trip.  It carries no trust: the session
//! context marks a cache-loaded identity as unverified, and every
//! trust-changing operation re-runs the server gateway.  All failures here
//! are logged and swallowed.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::{debug, warn};

use quizon_shared::AppUser;

/// JSON-file persistence for the last [`AppUser`].
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    /// Cache file in the platform data directory
    /// (e.g. `~/.local/share/quizon/session.json` on Linux).
    pub fn default_location() -> Option<Self> {
        let dirs = ProjectDirs::from("com", "quizon", "quizon")?;
        Some(Self::at(dirs.data_dir().join("session.json")))
    }

    /// Cache file at an explicit path (tests, embedded layouts).
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the cached user, if any.  A corrupt file reads as empty.
    pub fn load(&self) -> Option<AppUser> {
        let bytes = std::fs::read(&self.path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding corrupt session cache");
                None
            }
        }
    }

    /// Persist `user` as the cached session.
    pub fn store(&self, user: &AppUser) {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_vec(user)?;
            std::fs::write(&self.path, json)
        };
        match write() {
            Ok(()) => debug!(path = %self.path.display(), "session cache written"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to write session cache"),
        }
    }

    /// Remove the cached session (logout).
    pub fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "session cache cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to clear session cache"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quizon_shared::TelegramIdentity;

    fn sample_user() -> AppUser {
        let identity = TelegramIdentity::from_chat_sender(42, "Ana", None, None);
        AppUser::from_identity(&identity, Utc::now())
    }

    #[test]
    fn store_load_clear_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SessionCache::at(dir.path().join("session.json"));

        assert!(cache.load().is_none());

        let user = sample_user();
        cache.store(&user);
        assert_eq!(cache.load().unwrap().telegram_id, 42);

        cache.clear();
        assert!(cache.load().is_none());
        // Clearing twice is fine.
        cache.clear();
    }

    #[test]
    fn corrupt_cache_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"{not json").unwrap();

        let cache = SessionCache::at(&path);
        assert!(cache.load().is_none());
    }
}
