// ── Node session ──

use secrecy::{ExposeSecret, SecretString};
use strum::{AsRefStr, Display, EnumString};

/// Access level requested at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum AccessLevel {
    /// Read-only observer.
    Monitor,
    /// Holds control of the node. Only one control session exists per node.
    Control,
}

/// An authenticated session on one node.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SecretString,
    pub access_level: AccessLevel,
    pub user_id: String,
}

impl Session {
    pub fn is_control(&self) -> bool {
        self.access_level == AccessLevel::Control
    }

    /// Whether `other` is the raw token this session was issued.
    pub fn has_token(&self, other: &str) -> bool {
        self.token.expose_secret() == other
    }
}
