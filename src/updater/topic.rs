use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A coarse class of server-side change.
///
/// Serialized as the bare variant name, which is exactly what the backend
/// sends over `/ws/updater` (e.g. `"User"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    Passkey,
    User,
    Group,
    OAuthScope,
    OAuthPolicy,
    OAuthClient,
    Apod,
    Settings,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::Passkey,
        Topic::User,
        Topic::Group,
        Topic::OAuthScope,
        Topic::OAuthPolicy,
        Topic::OAuthClient,
        Topic::Apod,
        Topic::Settings,
    ];

    /// Parse an inbound frame payload.
    pub fn from_frame(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}
