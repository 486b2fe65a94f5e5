// Station and node descriptor endpoints
//
// Read-mostly resources the controller caches after login: product and
// device inventory (system level), plus the node's inspection descriptor,
// camera configuration, calibration, grading standards, and symbologies.

use crate::error::Error;
use crate::node::NodeClient;
use crate::node::models::{
    Calibration, CameraConfig, Devices, GradingStandards, InspectionInfo, JobList, PrintSettings,
    ProductInfo, Symbol,
};

impl NodeClient {
    // ── System level ─────────────────────────────────────────────────

    /// `GET /api/{root}/product`
    pub async fn product(&self) -> Result<ProductInfo, Error> {
        let url = self.system_url(&["product"])?;
        self.get_json_public(url).await
    }

    /// `GET /api/{root}/devices`
    pub async fn devices(&self) -> Result<Devices, Error> {
        let url = self.system_url(&["devices"])?;
        self.get_json_public(url).await
    }

    // ── Node descriptors ─────────────────────────────────────────────

    /// `GET inspection` -- the node's descriptor. Readable without a session.
    pub async fn inspection(&self) -> Result<InspectionInfo, Error> {
        let url = self.node_url(&["inspection"])?;
        self.get_json_public(url).await
    }

    /// `GET configuration/camera`
    pub async fn camera_config(&self) -> Result<CameraConfig, Error> {
        let url = self.node_url(&["configuration", "camera"])?;
        self.get_json(url).await
    }

    /// `GET calibrate/video?showAll=true`
    pub async fn calibration(&self) -> Result<Calibration, Error> {
        let mut url = self.node_url(&["calibrate", "video"])?;
        url.query_pairs_mut().append_pair("showAll", "true");
        self.get_json(url).await
    }

    /// `GET gradingstandards`
    pub async fn grading_standards(&self) -> Result<GradingStandards, Error> {
        let url = self.node_url(&["gradingstandards"])?;
        self.get_json(url).await
    }

    /// `GET inspection/verify/symbologies`
    pub async fn symbologies(&self) -> Result<Vec<Symbol>, Error> {
        let url = self.node_url(&["inspection", "verify", "symbologies"])?;
        self.get_json(url).await
    }

    /// `GET repository/jobs/design/`
    pub async fn jobs(&self) -> Result<JobList, Error> {
        let url = self.node_url(&["repository", "jobs", "design", ""])?;
        self.get_json(url).await
    }

    // ── Print ────────────────────────────────────────────────────────

    /// `GET inspection/print`
    pub async fn print_settings(&self) -> Result<PrintSettings, Error> {
        let url = self.node_url(&["inspection", "print"])?;
        self.get_json(url).await
    }

    /// `PUT inspection/print` with the override flag always cleared.
    pub async fn set_print(&self, enabled: bool) -> Result<(), Error> {
        let url = self.node_url(&["inspection", "print"])?;
        let body = PrintSettings {
            enabled,
            state: enabled,
            override_: false,
        };
        self.put_json(url, &body).await
    }

    // ── Event payloads ───────────────────────────────────────────────

    /// `PUT labelval?sendExtendedData=..` -- include detection data in
    /// pushed events.
    pub async fn set_send_extended_data(&self, enable: bool) -> Result<(), Error> {
        let mut url = self.node_url(&["labelval"])?;
        url.query_pairs_mut()
            .append_pair("sendExtendedData", if enable { "True" } else { "False" });
        self.put_text(url, "").await
    }
}
