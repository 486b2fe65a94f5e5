// ── Observed node lifecycle state ──

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Lifecycle state of a node as last reported by its event stream.
///
/// The controller never sets this from a command response; only
/// `heartbeat` and `stateChange` events move it.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    #[default]
    Offline,
    Idle,
    Editing,
    Running,
    Paused,
    Disconnected,
}

impl NodeState {
    /// Map a device state string. Unknown strings mean `Offline`.
    pub fn from_device(state: &str) -> Self {
        state.parse().unwrap_or(Self::Offline)
    }
}
