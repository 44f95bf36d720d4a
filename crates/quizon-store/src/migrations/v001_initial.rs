//! v001 -- Initial schema creation.
//!
//! Creates the `users` table with a unique index on `telegram_id`; that
//! index is what makes concurrent first-logins collapse into one row.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY NOT NULL,      -- UUID v4
    telegram_id   INTEGER NOT NULL,
    first_name    TEXT NOT NULL,
    last_name     TEXT NOT NULL DEFAULT '',
    username      TEXT NOT NULL DEFAULT '',
    language_code TEXT NOT NULL DEFAULT 'en',
    is_premium    INTEGER NOT NULL DEFAULT 0,
    photo_url     TEXT NOT NULL DEFAULT '',
    coins         INTEGER NOT NULL DEFAULT 0,
    xp            INTEGER NOT NULL DEFAULT 0,
    level         INTEGER NOT NULL DEFAULT 1,
    total_score   INTEGER NOT NULL DEFAULT 0,
    games_played  INTEGER NOT NULL DEFAULT 0,
    games_won     INTEGER NOT NULL DEFAULT 0,
    win_rate      INTEGER NOT NULL DEFAULT 0,
    streak        INTEGER NOT NULL DEFAULT 0,
    max_streak    INTEGER NOT NULL DEFAULT 0,
    achievements  TEXT NOT NULL DEFAULT '[]',     -- JSON array of strings
    settings      TEXT NOT NULL,                  -- JSON object
    created_at    TEXT NOT NULL,                  -- ISO-8601 / RFC-3339
    last_active   TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_users_telegram_id ON users(telegram_id);
CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);
CREATE INDEX IF NOT EXISTS idx_users_leaderboard ON users(total_score DESC, level DESC);
CREATE INDEX IF NOT EXISTS idx_users_last_active ON users(last_active DESC);
"#;

/// Apply the migration.
pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
