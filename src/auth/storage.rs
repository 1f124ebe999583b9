use std::sync::Mutex;

use anyhow::Result;
use rusqlite::Connection;

/// Credential types stored per backend.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Credential {
    /// Session JWT issued by the backend, sent as the `token` cookie and
    /// as the updater's `token` query parameter.
    #[serde(rename = "bearer")]
    Bearer { token: String },
}

impl Credential {
    pub fn token(&self) -> &str {
        match self {
            Credential::Bearer { token } => token,
        }
    }
}

/// Manages credential storage in SQLite.
///
/// Shares a database with [`Config`](crate::config::Config); pass the same path.
pub struct TokenStorage {
    conn: Mutex<Connection>,
}

impl TokenStorage {
    /// Open or create a credentials table in the given database path.
    /// Use `":memory:"` for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS credentials (
                backend TEXT PRIMARY KEY,
                data    TEXT NOT NULL
            )",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Stored credential for a backend key (see
    /// [`backend_key`](crate::auth::backend_key)). `None` when nothing is saved.
    pub fn get(&self, backend: &str) -> Result<Option<Credential>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT data FROM credentials WHERE backend = ?1")?;
        let mut rows = stmt.query([backend])?;
        match rows.next()? {
            Some(row) => {
                let json: String = row.get(0)?;
                let cred: Credential = serde_json::from_str(&json)?;
                Ok(Some(cred))
            }
            None => Ok(None),
        }
    }

    /// Store credential for a backend (upsert).
    pub fn set(&self, backend: &str, credential: &Credential) -> Result<()> {
        let json = serde_json::to_string(credential)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO credentials (backend, data) VALUES (?1, ?2)
             ON CONFLICT(backend) DO UPDATE SET data = excluded.data",
            [backend, &json],
        )?;
        Ok(())
    }

    /// Forget the credential for a backend. Removing an unknown key is not
    /// an error.
    pub fn remove(&self, backend: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM credentials WHERE backend = ?1", [backend])?;
        Ok(())
    }

    /// Token for a backend. Priority: stored credential → environment variable.
    pub fn token(&self, backend: &str, env_var: &str) -> Result<Option<String>> {
        if let Some(cred) = self.get(backend)? {
            return Ok(Some(cred.token().to_string()));
        }

        if let Ok(token) = std::env::var(env_var)
            && !token.is_empty()
        {
            return Ok(Some(token));
        }

        Ok(None)
    }
}
