use thiserror::Error;

/// Top-level error type for the `inspect-api` crate.
///
/// Covers every failure mode of the node surfaces: authentication,
/// transport, HTTP status, payload decoding, and the event stream.
/// `inspect-core` maps these into workflow-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected, or a token-bearing call came back 401.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// A token-bearing call was attempted without a session.
    #[error("No session token -- log in first")]
    MissingToken,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Protocol ────────────────────────────────────────────────────
    /// Node answered with a non-success status code.
    #[error("Node returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    // ── Event stream ────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

/// Coarse failure class, used to tell a dead link from a refusal
/// from a garbled answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request never completed (connection, timeout, socket).
    Transport,
    /// The node answered, but not with success.
    Protocol,
    /// The node answered with success, but the body did not decode.
    Payload,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(e) if e.is_decode() => ErrorKind::Payload,
            Self::Transport(_)
            | Self::InvalidUrl(_)
            | Self::Timeout { .. }
            | Self::WebSocketConnect(_)
            | Self::WebSocketClosed { .. } => ErrorKind::Transport,
            Self::Authentication { .. } | Self::MissingToken | Self::Http { .. } => {
                ErrorKind::Protocol
            }
            Self::Deserialization { .. } => ErrorKind::Payload,
        }
    }
}
