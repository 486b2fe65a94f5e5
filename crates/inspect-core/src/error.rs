// ── Core error types ──
//
// Workflow-level errors from inspect-core. Callers see connection,
// authentication and payload failures as domain variants; the
// `From<inspect_api::Error>` impl does the translation. Workflow
// preconditions that simply did not hold are reported as `Ok(false)`
// by the operations themselves, not through this type.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to node at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Node request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Event stream unavailable: {reason}")]
    EventStream { reason: String },

    // ── Session errors ───────────────────────────────────────────────
    #[error("Not logged in to the node")]
    NotLoggedIn,

    /// The session ended (logout or takeover) while an operation waited.
    #[error("Session closed while waiting for the node")]
    SessionClosed,

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    #[error("Node rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Resource not found: {path}")]
    NotFound { path: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Unexpected response payload: {message}")]
    Payload { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<inspect_api::Error> for CoreError {
    fn from(err: inspect_api::Error) -> Self {
        let kind = err.kind();
        match err {
            inspect_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            inspect_api::Error::MissingToken => CoreError::NotLoggedIn,
            inspect_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if kind == inspect_api::ErrorKind::Payload {
                    CoreError::Payload {
                        message: e.to_string(),
                    }
                } else {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                }
            }
            inspect_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            inspect_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            inspect_api::Error::Http { status: 404, body } => CoreError::NotFound { path: body },
            inspect_api::Error::Http { status, body } => CoreError::Rejected {
                status,
                message: body,
            },
            inspect_api::Error::WebSocketConnect(reason) => CoreError::EventStream { reason },
            inspect_api::Error::WebSocketClosed { code, reason } => CoreError::EventStream {
                reason: format!("closed (code {code}): {reason}"),
            },
            inspect_api::Error::Deserialization { message, body: _ } => {
                CoreError::Payload { message }
            }
        }
    }
}
