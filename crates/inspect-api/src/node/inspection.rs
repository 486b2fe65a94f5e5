// Setup and repeat endpoints
//
// Repeat selection, detection and inspection triggers, reports, and the
// BMP image of a captured repeat.

use bytes::Bytes;
use serde_json::Value;

use crate::error::Error;
use crate::node::NodeClient;
use crate::node::models::{AvailableRepeats, DetectResponse};

impl NodeClient {
    // ── Repeat lists ─────────────────────────────────────────────────

    /// `GET inspection/setup/image/available` -- repeats selectable while
    /// editing.
    pub async fn setup_repeats(&self) -> Result<AvailableRepeats, Error> {
        let url = self.node_url(&["inspection", "setup", "image", "available"])?;
        self.get_json(url).await
    }

    /// `GET inspection/repeat/images/available` -- repeats captured by the
    /// running job.
    pub async fn run_repeats(&self) -> Result<AvailableRepeats, Error> {
        let url = self.node_url(&["inspection", "repeat", "images", "available"])?;
        self.get_json(url).await
    }

    /// `PUT inspection/setup/image?source=history&repeat={n}` -- make a
    /// captured repeat the setup image.
    pub async fn select_repeat(&self, repeat: u32) -> Result<(), Error> {
        let mut url = self.node_url(&["inspection", "setup", "image"])?;
        url.query_pairs_mut()
            .append_pair("source", "history")
            .append_pair("repeat", &repeat.to_string());
        self.put_text(url, "").await
    }

    /// `PUT inspection/stopevent/failure/removed/{n}`
    pub async fn remove_repeat(&self, repeat: u32) -> Result<(), Error> {
        let n = repeat.to_string();
        let url = self.node_url(&["inspection", "stopevent", "failure", "removed", &n])?;
        self.put_text(url, "").await
    }

    // ── Setup triggers ───────────────────────────────────────────────

    /// `PUT inspection/setup/inspect`
    pub async fn inspect(&self) -> Result<(), Error> {
        let url = self.node_url(&["inspection", "setup", "inspect"])?;
        self.put_text(url, "").await
    }

    /// `GET inspection/setup/detect`
    pub async fn detect_status(&self) -> Result<DetectResponse, Error> {
        let url = self.node_url(&["inspection", "setup", "detect"])?;
        self.get_json(url).await
    }

    /// `PUT inspection/setup/detect` -- start sector auto-detection.
    pub async fn start_detect(&self) -> Result<(), Error> {
        let url = self.node_url(&["inspection", "setup", "detect"])?;
        self.put_text(url, "").await
    }

    // ── Reports ──────────────────────────────────────────────────────

    /// `GET inspection/setup/report` -- report of the current setup image.
    pub async fn setup_report(&self) -> Result<Value, Error> {
        let url = self.node_url(&["inspection", "setup", "report"])?;
        self.get_json(url).await
    }

    /// `GET inspection/repeat/reports/{n}`
    pub async fn repeat_report(&self, repeat: u32) -> Result<Value, Error> {
        let n = repeat.to_string();
        let url = self.node_url(&["inspection", "repeat", "reports", &n])?;
        self.get_json(url).await
    }

    /// `GET inspection/repeat/images/{n}?scale=1.0` -- BMP bytes.
    pub async fn repeat_image(&self, repeat: u32) -> Result<Bytes, Error> {
        let n = repeat.to_string();
        let mut url = self.node_url(&["inspection", "repeat", "images", &n])?;
        url.query_pairs_mut().append_pair("scale", "1.0");
        self.get_bytes(url).await
    }
}
