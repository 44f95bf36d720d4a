/// Application name
pub const APP_NAME: &str = "Quizon";

/// HMAC key for deriving the per-bot signing secret, fixed by the
/// Telegram WebApp algorithm.
pub const WEB_APP_DATA_KEY: &[u8] = b"WebAppData";

/// Default maximum accepted age of a signed init-data payload (one day).
pub const DEFAULT_MAX_AGE_SECS: i64 = 86_400;

/// Coins granted to a freshly created user
pub const STARTING_COINS: i64 = 1000;

/// XP granted to a freshly created user
pub const STARTING_XP: i64 = 200;

/// Total score granted to a freshly created user
pub const STARTING_SCORE: i64 = 100;

/// XP required per level: level = xp / XP_PER_LEVEL + 1
pub const XP_PER_LEVEL: i64 = 1000;

/// Bonus coins granted on level-up, multiplied by the new level
pub const LEVEL_UP_BONUS_COINS: i64 = 50;

/// Settings language when the Telegram identity carries none
pub const DEFAULT_LANGUAGE: &str = "en";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
