//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use inspect_config::ConfigError;
use inspect_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const WORKFLOW: i32 = 5;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to node at {url}")]
    #[diagnostic(
        code(inspectctl::connection_failed),
        help(
            "Check that the station is running and the node index is right.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Event stream unavailable: {reason}")]
    #[diagnostic(code(inspectctl::event_stream))]
    EventStream { reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed")]
    #[diagnostic(
        code(inspectctl::auth_failed),
        help(
            "Verify the user name and password.\n\
             Run: inspectctl config set-password --profile <name>"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(inspectctl::no_credentials),
        help("Set a password with: inspectctl config set-password\nOr set INSPECT_PASSWORD.")
    )]
    NoCredentials { profile: String },

    #[error("The session ended while waiting for the node")]
    #[diagnostic(
        code(inspectctl::session_closed),
        help("Another client may have taken control of the node.")
    )]
    SessionClosed,

    // ── Node responses ───────────────────────────────────────────────

    #[error("Not found on the node: {path}")]
    #[diagnostic(code(inspectctl::not_found), help("Run: inspectctl jobs"))]
    NotFound { path: String },

    #[error("Node rejected the request (HTTP {status}): {message}")]
    #[diagnostic(code(inspectctl::rejected))]
    Rejected { status: u16, message: String },

    #[error("Unexpected response from the node: {message}")]
    #[diagnostic(code(inspectctl::payload))]
    Payload { message: String },

    // ── Workflow ─────────────────────────────────────────────────────

    #[error("{operation} did not complete")]
    #[diagnostic(code(inspectctl::workflow), help("{hint}"))]
    Workflow { operation: String, hint: String },

    #[error("{message}")]
    #[diagnostic(code(inspectctl::precondition))]
    Precondition { message: String },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(inspectctl::timeout),
        help("Increase timeout with --timeout or check node responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Validation / configuration ───────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(inspectctl::validation))]
    Validation { field: String, reason: String },

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(inspectctl::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No node configured")]
    #[diagnostic(
        code(inspectctl::no_config),
        help(
            "Pass --host, or add a profile to the configuration file.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(inspectctl::config))]
    Config { message: String },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(inspectctl::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::EventStream { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } | Self::SessionClosed => {
                exit_code::AUTH
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Workflow { .. } | Self::Precondition { .. } => exit_code::WORKFLOW,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::EventStream { reason } => CliError::EventStream { reason },
            CoreError::NotLoggedIn | CoreError::SessionClosed => CliError::SessionClosed,
            CoreError::Precondition { message } => CliError::Precondition { message },
            CoreError::Rejected { status, message } => CliError::Rejected { status, message },
            CoreError::NotFound { path } => CliError::NotFound { path },
            CoreError::Payload { message } => CliError::Payload { message },
            CoreError::Io(e) => CliError::Io(e),
            CoreError::Config { message } => CliError::Config { message },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: String::new(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
