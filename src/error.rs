//! Error types for the update socket.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdaterError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// An inbound frame that is not a topic string.
    #[error("Malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    /// The server refused the upgrade (e.g. an invalid or expired token).
    #[error("Handshake rejected with HTTP {0}")]
    Rejected(u16),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

impl UpdaterError {
    /// Whether retrying the connection can never succeed.
    pub fn is_permanent(&self) -> bool {
        match self {
            UpdaterError::Rejected(status) => matches!(status, 401 | 403),
            UpdaterError::UnsupportedScheme(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, UpdaterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_rejection_is_permanent() {
        assert!(UpdaterError::Rejected(401).is_permanent());
        assert!(UpdaterError::Rejected(403).is_permanent());
    }

    #[test]
    fn transient_errors_are_retried() {
        assert!(!UpdaterError::Rejected(502).is_permanent());
        assert!(!UpdaterError::ConnectionClosed.is_permanent());
    }

    #[test]
    fn malformed_frame_is_not_permanent() {
        let err: UpdaterError = serde_json::from_str::<u8>("x").unwrap_err().into();
        assert!(matches!(err, UpdaterError::Json(_)));
        assert!(!err.is_permanent());
    }

    #[test]
    fn bad_scheme_is_permanent() {
        assert!(UpdaterError::UnsupportedScheme("ftp".to_string()).is_permanent());
    }
}
