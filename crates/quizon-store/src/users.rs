//! Typed CRUD and economy mutations for the `users` table.
//!
//! Economy mutations go through [`Database::with_user`], which re-reads the
//! row inside a transaction, applies the model's own mutators (so the
//! level and win-rate rules hold no matter who calls), and writes the full
//! row back.  Derived fields are never accepted from callers.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use quizon_shared::{AppUser, UserPatch, UserSettings};

use crate::database::Database;
use crate::error::{Result, StoreError};

const USER_COLUMNS: &str = "id, telegram_id, first_name, last_name, username, language_code, \
     is_premium, photo_url, coins, xp, level, total_score, games_played, games_won, win_rate, \
     streak, max_streak, achievements, settings, created_at, last_active";

impl Database {
    /// Insert a new user row.
    ///
    /// A duplicate `telegram_id` surfaces as [`StoreError::Conflict`];
    /// reconciliation turns that into an update retry.
    pub fn insert_user(&self, user: &AppUser) -> Result<()> {
        insert_user(self.conn(), user)
    }

    /// Persist every mutable column of an existing user row.
    pub fn update_user(&self, user: &AppUser) -> Result<()> {
        update_user(self.conn(), user)
    }

    /// Fetch a user by storage id, failing with [`StoreError::NotFound`].
    pub fn get_user(&self, id: Uuid) -> Result<AppUser> {
        get_by_id(self.conn(), id)
    }

    /// Look up a user by Telegram id.
    pub fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<AppUser>> {
        find_by_telegram_id(self.conn(), telegram_id)
    }

    /// Apply a whitelisted profile patch and bump `last_active`.
    pub fn patch_user(&mut self, id: Uuid, patch: &UserPatch) -> Result<AppUser> {
        self.with_user(id, |user| user.apply_patch(patch))
    }

    /// Credit coins.
    pub fn add_coins(&mut self, id: Uuid, amount: i64) -> Result<AppUser> {
        self.with_user(id, |user| user.add_coins(amount))
    }

    /// Credit XP; the level rule and the level-up coin bonus are applied by
    /// the model inside the transaction.
    pub fn add_xp(&mut self, id: Uuid, amount: i64) -> Result<AppUser> {
        self.with_user(id, |user| user.add_xp(amount))
    }

    /// Credit total score.
    pub fn add_score(&mut self, id: Uuid, amount: i64) -> Result<AppUser> {
        self.with_user(id, |user| user.add_score(amount))
    }

    /// Record a finished game (win/loss, streaks, win rate).
    pub fn update_game_stats(&mut self, id: Uuid, won: bool) -> Result<AppUser> {
        self.with_user(id, |user| user.update_game_stats(won, Utc::now()))
    }

    /// Top users by total score, then level.
    pub fn leaderboard(&self, limit: u32) -> Result<Vec<AppUser>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users
             ORDER BY total_score DESC, level DESC
             LIMIT ?1"
        ))?;

        let rows = stmt.query_map(params![limit], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    /// Read-modify-write one user atomically.
    fn with_user(&mut self, id: Uuid, mutate: impl FnOnce(&mut AppUser)) -> Result<AppUser> {
        let tx = self.conn_mut().transaction()?;
        let mut user = get_by_id(&tx, id)?;
        mutate(&mut user);
        user.last_active = Utc::now();
        update_user(&tx, &user)?;
        tx.commit()?;
        Ok(user)
    }
}

pub(crate) fn insert_user(conn: &Connection, user: &AppUser) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, telegram_id, first_name, last_name, username, language_code,
             is_premium, photo_url, coins, xp, level, total_score, games_played, games_won,
             win_rate, streak, max_streak, achievements, settings, created_at, last_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
             ?18, ?19, ?20, ?21)",
        params![
            user.id.to_string(),
            user.telegram_id,
            user.first_name,
            user.last_name,
            user.username,
            user.language_code,
            user.is_premium,
            user.photo_url,
            user.coins,
            user.xp,
            user.level,
            user.total_score,
            user.games_played,
            user.games_won,
            user.win_rate,
            user.streak,
            user.max_streak,
            serde_json::to_string(&user.achievements)?,
            serde_json::to_string(&user.settings)?,
            user.created_at.to_rfc3339(),
            user.last_active.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub(crate) fn update_user(conn: &Connection, user: &AppUser) -> Result<()> {
    let affected = conn.execute(
        "UPDATE users SET first_name = ?2, last_name = ?3, username = ?4, language_code = ?5,
             is_premium = ?6, photo_url = ?7, coins = ?8, xp = ?9, level = ?10,
             total_score = ?11, games_played = ?12, games_won = ?13, win_rate = ?14,
             streak = ?15, max_streak = ?16, achievements = ?17, settings = ?18,
             last_active = ?19
         WHERE id = ?1",
        params![
            user.id.to_string(),
            user.first_name,
            user.last_name,
            user.username,
            user.language_code,
            user.is_premium,
            user.photo_url,
            user.coins,
            user.xp,
            user.level,
            user.total_score,
            user.games_played,
            user.games_won,
            user.win_rate,
            user.streak,
            user.max_streak,
            serde_json::to_string(&user.achievements)?,
            serde_json::to_string(&user.settings)?,
            user.last_active.to_rfc3339(),
        ],
    )?;
    if affected == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

pub(crate) fn get_by_id(conn: &Connection, id: Uuid) -> Result<AppUser> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id.to_string()],
        row_to_user,
    )
    .map_err(StoreError::from)
}

pub(crate) fn find_by_telegram_id(conn: &Connection, telegram_id: i64) -> Result<Option<AppUser>> {
    match conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_id = ?1"),
        params![telegram_id],
        row_to_user,
    ) {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(other) => Err(other.into()),
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppUser> {
    let id_str: String = row.get(0)?;
    let achievements_json: String = row.get(17)?;
    let settings_json: String = row.get(18)?;
    let created_str: String = row.get(19)?;
    let last_active_str: String = row.get(20)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| conversion_err(0, e))?;
    let achievements: Vec<String> =
        serde_json::from_str(&achievements_json).map_err(|e| conversion_err(17, e))?;
    let settings: UserSettings =
        serde_json::from_str(&settings_json).map_err(|e| conversion_err(18, e))?;
    let created_at = parse_timestamp(&created_str).map_err(|e| conversion_err(19, e))?;
    let last_active = parse_timestamp(&last_active_str).map_err(|e| conversion_err(20, e))?;

    Ok(AppUser {
        id,
        telegram_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        username: row.get(4)?,
        language_code: row.get(5)?,
        is_premium: row.get(6)?,
        photo_url: row.get(7)?,
        coins: row.get(8)?,
        xp: row.get(9)?,
        level: row.get(10)?,
        total_score: row.get(11)?,
        games_played: row.get(12)?,
        games_won: row.get(13)?,
        win_rate: row.get(14)?,
        streak: row.get(15)?,
        max_streak: row.get(16)?,
        achievements,
        settings,
        created_at,
        last_active,
    })
}

fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

fn conversion_err(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}
