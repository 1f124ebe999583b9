//! Client configuration.
//!
//! [`Config`] is a key/value table in the shared SQLite database (the same
//! file [`TokenStorage`](crate::auth::TokenStorage) uses).
//! [`ClientSettings`] resolves the known keys over built-in defaults.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use std::sync::Mutex;
use url::Url;

use crate::consts::DEFAULT_BACKEND_URL;
use crate::updater::ConnectionConfig;

pub const KEY_BACKEND_URL: &str = "backend_url";
pub const KEY_HEARTBEAT_SECS: &str = "heartbeat_secs";
pub const KEY_RECONNECT_DELAY_MS: &str = "reconnect_delay_ms";
pub const KEY_MAX_RECONNECT_ATTEMPTS: &str = "max_reconnect_attempts";

/// Keys `config set` accepts.
pub const KNOWN_KEYS: &[&str] = &[
    KEY_BACKEND_URL,
    KEY_HEARTBEAT_SECS,
    KEY_RECONNECT_DELAY_MS,
    KEY_MAX_RECONNECT_ATTEMPTS,
];

/// Persistent key-value configuration store.
pub struct Config {
    conn: Mutex<Connection>,
}

impl Config {
    /// Open or create the config table in the given database.
    /// Use `":memory:"` for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).context("failed to open config database")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS config (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .context("failed to create config table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT value FROM config WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Set a value (upsert). Known keys are validated before storing.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        validate(key, value)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM config WHERE key = ?1", [key])?;
        Ok(())
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>>
    where
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.get(key)?
            .map(|raw| {
                validate(key, &raw)?;
                raw.parse::<T>()
                    .with_context(|| format!("invalid value for {key}: {raw}"))
            })
            .transpose()
    }
}

fn validate(key: &str, value: &str) -> Result<()> {
    match key {
        KEY_BACKEND_URL => {
            Url::parse(value).with_context(|| format!("invalid backend url: {value}"))?;
        }
        KEY_HEARTBEAT_SECS | KEY_RECONNECT_DELAY_MS => {
            let n: u64 = value
                .parse()
                .with_context(|| format!("{key} must be a whole number"))?;
            if n == 0 {
                bail!("{key} must be greater than zero");
            }
        }
        KEY_MAX_RECONNECT_ATTEMPTS => {
            value
                .parse::<u32>()
                .with_context(|| format!("{key} must be a whole number"))?;
        }
        _ => bail!("unknown config key: {key} (known: {})", KNOWN_KEYS.join(", ")),
    }
    Ok(())
}

/// Everything needed to talk to one backend.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub backend_url: Url,
    pub connection: ConnectionConfig,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            backend_url: Url::parse(DEFAULT_BACKEND_URL).expect("default backend url is valid"),
            connection: ConnectionConfig::default(),
        }
    }
}

impl ClientSettings {
    /// Stored values over defaults. A `max_reconnect_attempts` of 0 means
    /// retry forever.
    pub fn load(config: &Config) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(url) = config.get(KEY_BACKEND_URL)? {
            settings.backend_url =
                Url::parse(&url).with_context(|| format!("invalid backend url: {url}"))?;
        }
        if let Some(secs) = config.parsed::<u64>(KEY_HEARTBEAT_SECS)? {
            settings.connection.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = config.parsed::<u64>(KEY_RECONNECT_DELAY_MS)? {
            settings.connection.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(max) = config.parsed::<u32>(KEY_MAX_RECONNECT_ATTEMPTS)? {
            settings.connection.max_reconnect_attempts = (max > 0).then_some(max);
        }
        Ok(settings)
    }
}
