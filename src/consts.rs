//! Project-wide constants.

use std::path::PathBuf;

/// Path of the update socket, relative to the backend base URL.
pub const UPDATER_PATH: &str = "/ws/updater";

/// Literal frame sent as a liveness ping.
pub const HEARTBEAT_MESSAGE: &str = "heartbeat";

/// Backend used when neither a flag nor the config store names one.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Cookie the backend reads the session JWT from.
pub const TOKEN_COOKIE: &str = "token";

/// Default database path: `~/.positron/positron.db`.
/// Single DB for config and credentials.
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".positron")
        .join("positron.db")
}
