//! The durable user model and its game-economy invariants.
//!
//! Two rules are enforced here and nowhere else:
//!
//! - `win_rate = round(100 * games_won / games_played)`, 0 when no games
//!   were played, recomputed on every stat mutation;
//! - `level = xp / 1000 + 1`, recomputed on every xp change, with a bonus
//!   of `50 * new_level` coins when a level boundary is crossed.
//!
//! The store re-runs these mutators itself; it never trusts derived fields
//! arriving from callers.  Externally mutable fields are whitelisted in
//! [`UserPatch`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    DEFAULT_LANGUAGE, LEVEL_UP_BONUS_COINS, STARTING_COINS, STARTING_SCORE, STARTING_XP,
    XP_PER_LEVEL,
};
use crate::init_data::TelegramIdentity;

/// Per-user preferences, stored as a JSON column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub language: String,
    pub notifications: bool,
    pub sound: bool,
    pub vibration: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            notifications: true,
            sound: true,
            vibration: true,
        }
    }
}

/// A persisted player.  `telegram_id` is unique and immutable after
/// creation; profile fields mirror the latest verified Telegram identity.
///
/// Serialized as camelCase JSON for the app boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppUser {
    pub id: Uuid,
    pub telegram_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub language_code: String,
    pub is_premium: bool,
    pub photo_url: String,
    pub coins: i64,
    pub xp: i64,
    pub level: i64,
    pub total_score: i64,
    pub games_played: i64,
    pub games_won: i64,
    pub win_rate: i64,
    pub streak: i64,
    pub max_streak: i64,
    pub achievements: Vec<String>,
    pub settings: UserSettings,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl AppUser {
    /// Build a brand-new player from a Telegram identity with the starting
    /// economy grants.
    pub fn from_identity(identity: &TelegramIdentity, now: DateTime<Utc>) -> Self {
        let language = identity
            .language_code
            .clone()
            .filter(|code| !code.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Self {
            id: Uuid::new_v4(),
            telegram_id: identity.id,
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone().unwrap_or_default(),
            username: identity.username.clone().unwrap_or_default(),
            language_code: language.clone(),
            is_premium: identity.is_premium.unwrap_or(false),
            photo_url: identity.photo_url.clone().unwrap_or_default(),
            coins: STARTING_COINS,
            xp: STARTING_XP,
            level: STARTING_XP / XP_PER_LEVEL + 1,
            total_score: STARTING_SCORE,
            games_played: 0,
            games_won: 0,
            win_rate: 0,
            streak: 0,
            max_streak: 0,
            achievements: Vec::new(),
            settings: UserSettings {
                language,
                ..UserSettings::default()
            },
            created_at: now,
            last_active: now,
        }
    }

    /// Refresh profile fields from a newer identity for the same
    /// `telegram_id`.  An absent or empty incoming value never erases an
    /// existing one.
    pub fn merge_identity(&mut self, identity: &TelegramIdentity) {
        debug_assert_eq!(self.telegram_id, identity.id);

        if !identity.first_name.is_empty() {
            self.first_name = identity.first_name.clone();
        }
        merge_string(&mut self.last_name, identity.last_name.as_deref());
        merge_string(&mut self.username, identity.username.as_deref());
        merge_string(&mut self.language_code, identity.language_code.as_deref());
        merge_string(&mut self.photo_url, identity.photo_url.as_deref());
        if let Some(premium) = identity.is_premium {
            self.is_premium = premium;
        }
    }

    pub fn add_coins(&mut self, amount: i64) {
        self.coins += amount;
    }

    /// Add XP and recompute the level.  Crossing a level boundary awards
    /// `50 * new_level` bonus coins.
    pub fn add_xp(&mut self, amount: i64) {
        self.xp += amount;
        let new_level = self.xp / XP_PER_LEVEL + 1;
        if new_level > self.level {
            self.coins += new_level * LEVEL_UP_BONUS_COINS;
            self.level = new_level;
        }
    }

    pub fn add_score(&mut self, amount: i64) {
        self.total_score += amount;
    }

    /// Record one finished game.  A loss resets the streak; the win rate is
    /// always recomputed from its inputs.
    pub fn update_game_stats(&mut self, won: bool, now: DateTime<Utc>) {
        self.games_played += 1;
        if won {
            self.games_won += 1;
            self.streak += 1;
            if self.streak > self.max_streak {
                self.max_streak = self.streak;
            }
        } else {
            self.streak = 0;
        }
        self.recompute_win_rate();
        self.last_active = now;
    }

    /// The one win-rate rule: `round(100 * games_won / games_played)`.
    pub fn recompute_win_rate(&mut self) {
        self.win_rate = if self.games_played > 0 {
            (100.0 * self.games_won as f64 / self.games_played as f64).round() as i64
        } else {
            0
        };
    }

    /// Apply a whitelisted profile patch.  Derived fields and counters are
    /// not reachable from here.
    pub fn apply_patch(&mut self, patch: &UserPatch) {
        if let Some(first_name) = &patch.first_name {
            if !first_name.is_empty() {
                self.first_name = first_name.clone();
            }
        }
        if let Some(last_name) = &patch.last_name {
            self.last_name = last_name.clone();
        }
        if let Some(username) = &patch.username {
            self.username = username.clone();
        }
        if let Some(language_code) = &patch.language_code {
            if !language_code.is_empty() {
                self.language_code = language_code.clone();
            }
        }
        if let Some(photo_url) = &patch.photo_url {
            self.photo_url = photo_url.clone();
        }
        if let Some(settings) = &patch.settings {
            self.settings = settings.clone();
        }
    }

    /// `@username`, or first/last name, for chat and leaderboard display.
    pub fn display_name(&self) -> String {
        if !self.username.is_empty() {
            format!("@{}", self.username)
        } else if !self.last_name.is_empty() {
            format!("{} {}", self.first_name, self.last_name)
        } else {
            self.first_name.clone()
        }
    }

    /// XP gathered inside the current level and the level's span.
    pub fn level_progress(&self) -> (i64, i64) {
        ((self.xp - (self.level - 1) * XP_PER_LEVEL), XP_PER_LEVEL)
    }

    pub fn can_afford(&self, cost: i64) -> bool {
        self.coins >= cost
    }
}

/// Whitelist of externally mutable fields.  Unknown fields are rejected at
/// deserialization time, so a client cannot smuggle `coins` or `winRate`
/// through an update call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<UserSettings>,
}

fn merge_string(existing: &mut String, incoming: Option<&str>) {
    if let Some(value) = incoming {
        if !value.is_empty() {
            *existing = value.to_string();
        }
    }
}
