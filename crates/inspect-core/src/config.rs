// ── Runtime node configuration ──
//
// These types describe *which* node to drive and *how*. They carry
// credentials and tuning but never touch disk; inspect-config (or a test)
// builds a `NodeConfig` and hands it to the `Controller`.

use std::path::PathBuf;
use std::time::Duration;

use inspect_api::endpoints::DEFAULT_API_ROOT;
use inspect_api::node::models::Symbol;
use secrecy::SecretString;
use url::Url;

use crate::model::FirmwareVersion;

/// Login credentials for the node.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// How simulator images reach a simulated node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImageExchange {
    /// Upload through `simulation/triggerimage`.
    #[default]
    Remote,
    /// Write into the simulator's watched image directory (local nodes).
    Directory(PathBuf),
}

/// Where the symbology table used to classify detections comes from.
#[derive(Debug, Clone, Default)]
pub enum SymbologySource {
    /// Fetched from `inspection/verify/symbologies` after login.
    #[default]
    Node,
    /// A fixed table, for firmware that does not serve one.
    Static(Vec<Symbol>),
}

/// Upper bounds on the controller's event-driven waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimeouts {
    /// Stop → Editing.
    pub edit: Duration,
    /// Simulator start → `labelBegin`.
    pub label_begin: Duration,
    /// Detection start → learned sectors created.
    pub detect: Duration,
    /// Start → Running.
    pub run: Duration,
}

impl Default for WaitTimeouts {
    fn default() -> Self {
        Self {
            edit: Duration::from_secs(10),
            label_begin: Duration::from_secs(10),
            detect: Duration::from_secs(20),
            run: Duration::from_secs(30),
        }
    }
}

/// Per-device-family parameters.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    /// `/api/{root}` path segment.
    pub api_root: String,
    /// Newest simulator firmware that keeps the first image in its
    /// directory; on these, undeletable images are worked around with a
    /// filename prefix.
    pub simulator_prefix_gate: FirmwareVersion,
    pub symbologies: SymbologySource,
    pub waits: WaitTimeouts,
    /// Repeats kept in memory; the lowest numbers are evicted first.
    pub repeat_capacity: usize,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.into(),
            simulator_prefix_gate: FirmwareVersion::new(1, 1, 0, 3009),
            symbologies: SymbologySource::Node,
            waits: WaitTimeouts::default(),
            repeat_capacity: 256,
        }
    }
}

/// Configuration for driving a single node.
///
/// Built by the CLI or a test, passed to `Controller` -- core never reads
/// config files.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub host: String,
    /// Station port; the node listens on `system_port + node`.
    pub system_port: u16,
    pub node: u16,
    pub credentials: Credentials,
    /// Per-request timeout.
    pub timeout: Duration,
    pub image_exchange: ImageExchange,
    /// Replaces the derived event-stream URL.
    pub event_stream_url: Option<Url>,
    /// Where the compiled grading-standard table is written. `None` keeps
    /// it in memory only.
    pub standards_path: Option<PathBuf>,
    pub profile: DeviceProfile,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            system_port: 8080,
            node: 1,
            credentials: Credentials {
                username: "admin".into(),
                password: SecretString::from(String::new()),
            },
            timeout: Duration::from_secs(30),
            image_exchange: ImageExchange::default(),
            event_stream_url: None,
            standards_path: None,
            profile: DeviceProfile::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_waits() {
        let w = WaitTimeouts::default();
        assert_eq!(w.edit, Duration::from_secs(10));
        assert_eq!(w.label_begin, Duration::from_secs(10));
        assert_eq!(w.detect, Duration::from_secs(20));
        assert_eq!(w.run, Duration::from_secs(30));
    }

    #[test]
    fn default_profile() {
        let p = DeviceProfile::default();
        assert_eq!(p.api_root, "printinspection");
        assert_eq!(p.simulator_prefix_gate.to_string(), "1.1.0.3009");
    }
}
