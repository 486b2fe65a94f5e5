// Simulator endpoints
//
// Only meaningful on nodes whose inspection descriptor reports the
// `simulator` device.

use bytes::Bytes;

use crate::error::Error;
use crate::node::NodeClient;
use crate::node::models::SimulationSettings;

impl NodeClient {
    /// `GET simulation`
    pub async fn simulation(&self) -> Result<SimulationSettings, Error> {
        let url = self.node_url(&["simulation"])?;
        self.get_json(url).await
    }

    /// `PUT simulation`
    pub async fn set_simulation(&self, settings: &SimulationSettings) -> Result<(), Error> {
        let url = self.node_url(&["simulation"])?;
        self.put_json(url, settings).await
    }

    /// `PUT simulation/trigger` -- capture the next image from the
    /// simulator directory.
    pub async fn trigger_simulator(&self) -> Result<(), Error> {
        let url = self.node_url(&["simulation", "trigger"])?;
        self.put_text(url, "").await
    }

    /// `PUT simulation/triggerimage?dpi={dpi}` -- capture the given image.
    pub async fn trigger_simulator_image(&self, image: Bytes, dpi: u32) -> Result<(), Error> {
        let mut url = self.node_url(&["simulation", "triggerimage"])?;
        url.query_pairs_mut().append_pair("dpi", &dpi.to_string());
        self.put_bytes(url, image).await
    }

    /// `PUT simulation/start`
    pub async fn start_simulator(&self) -> Result<(), Error> {
        let url = self.node_url(&["simulation", "start"])?;
        self.put_text(url, "").await
    }

    /// `PUT simulation/stop`
    pub async fn stop_simulator(&self) -> Result<(), Error> {
        let url = self.node_url(&["simulation", "stop"])?;
        self.put_text(url, "").await
    }
}
