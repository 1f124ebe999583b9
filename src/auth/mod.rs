//! Session token storage.
//!
//! The backend owns every authentication ceremony; this client only keeps
//! the session token it was handed, keyed by backend URL.

pub mod storage;

pub use storage::{Credential, TokenStorage};

use anyhow::{Context, Result, bail};
use url::Url;

/// Environment variable consulted when no token is stored.
pub const TOKEN_ENV_VAR: &str = "POSITRON_TOKEN";

/// Credentials are keyed by origin so `/` and path variants share a token.
pub fn backend_key(backend: &Url) -> String {
    backend.origin().ascii_serialization()
}

/// Save a session token for `backend`.
pub fn login(db_path: &str, backend: &Url, token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!("no token provided");
    }
    let storage = TokenStorage::open(db_path).context("failed to open token storage")?;
    storage
        .set(
            &backend_key(backend),
            &Credential::Bearer {
                token: token.to_string(),
            },
        )
        .context("failed to save token")?;
    Ok(())
}

/// Remove the stored token for `backend`.
pub fn logout(db_path: &str, backend: &Url) -> Result<()> {
    let storage = TokenStorage::open(db_path).context("failed to open token storage")?;
    storage
        .remove(&backend_key(backend))
        .context("failed to remove token")?;
    Ok(())
}

/// Token to use for `backend`: stored first, then `POSITRON_TOKEN`.
pub fn resolve_token(db_path: &str, backend: &Url) -> Result<Option<String>> {
    let storage = TokenStorage::open(db_path).context("failed to open token storage")?;
    storage.token(&backend_key(backend), TOKEN_ENV_VAR)
}
