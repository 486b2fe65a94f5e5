// ── Label pipeline ──
//
// Getting a label in front of the node's camera. Printed labels go to the
// caller's spooler; simulated ones are uploaded or dropped into the
// simulator's image directory. Once the node has captured the image,
// `process_label` prepares sectors and inspects. The report arrives later
// with `labelEnd` (see `reports`).

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ImageExchange;
use crate::controller::Controller;
use crate::error::CoreError;
use crate::model::{Label, SectorIntent};
use crate::sectors::RestoreOutcome;
use crate::simulator::SimulatorDirectory;
use crate::spooler::PrintSpooler;

impl Controller {
    /// Print `label` through `spooler` and, in control mode, enable
    /// printing so the node captures it.
    ///
    /// `Ok(false)` when the label has no image or printing could not be
    /// enabled.
    pub async fn process_printed_label(
        &self,
        label: Label,
        spooler: &dyn PrintSpooler,
    ) -> Result<bool, CoreError> {
        let Some(image) = label.image.clone() else {
            warn!("printed label has no image");
            return Ok(false);
        };
        let label = Arc::new(label);
        self.activate_label(Arc::clone(&label)).await?;

        spooler.spool(&image, label.dpi)?;
        debug!(bytes = image.len(), dpi = ?label.dpi, "label spooled");

        if self.is_control() {
            return self.toggle_print(true).await;
        }
        Ok(true)
    }

    /// Feed `label` to a simulated node.
    pub async fn process_simulator_label(&self, label: Label) -> Result<bool, CoreError> {
        let Some(image) = label.image.clone() else {
            warn!("simulator label has no image");
            return Ok(false);
        };
        let client = &self.inner.client;

        match self.inner.config.image_exchange {
            ImageExchange::Remote => {
                let dpi = label.dpi.ok_or_else(|| CoreError::Precondition {
                    message: "a remotely triggered simulator image needs a dpi".into(),
                })?;
                self.activate_label(Arc::new(label)).await?;
                client.trigger_simulator_image(image, dpi).await?;
                Ok(true)
            }
            ImageExchange::Directory(ref path) => {
                self.activate_label(Arc::new(label)).await?;

                let dir = SimulatorDirectory::new(path);
                let prefix = if dir.delete_all_images() {
                    String::new()
                } else {
                    self.check_prefix_workaround()?;
                    dir.next_prefix()?
                };
                dir.save_image(&prefix, &image)?;

                if self.is_control() {
                    self.simulator_toggle_print().await
                } else {
                    client.trigger_simulator().await?;
                    Ok(true)
                }
            }
        }
    }

    /// Older simulator firmware holds on to the first image of its
    /// directory; only there is an undeletable image worked around.
    fn check_prefix_workaround(&self) -> Result<(), CoreError> {
        let gate = self.inner.config.profile.simulator_prefix_gate;
        match self.firmware_version() {
            Some(version) if version <= gate => {
                debug!(%version, "simulator image not deleted, using a prefix");
                Ok(())
            }
            version => Err(CoreError::Precondition {
                message: format!(
                    "could not clear the simulator image directory (firmware {})",
                    version.map_or_else(|| "unknown".to_owned(), |v| v.to_string())
                ),
            }),
        }
    }

    /// Prepare sectors for a captured label and inspect it.
    ///
    /// `repeat` defaults to the newest available repeat. Raw-trigger labels
    /// are inspected against the job as loaded. `Ok(false)` when sector
    /// preparation failed.
    pub async fn process_label(
        &self,
        repeat: Option<u32>,
        label: Arc<Label>,
    ) -> Result<bool, CoreError> {
        self.activate_label(Arc::clone(&label)).await?;

        let repeat = match repeat {
            Some(n) => n,
            None => self.latest_repeat().await?,
        };
        if repeat > 0 {
            self.inner.client.select_repeat(repeat).await?;
        }

        if label.handler.is_trigger() {
            if label.sectors != SectorIntent::Untouched {
                warn!(
                    repeat,
                    handler = ?label.handler,
                    "trigger labels keep the loaded sectors, ignoring the label's sector intent"
                );
            }
        } else {
            match self.restore_or_detect(&label).await {
                RestoreOutcome::Success | RestoreOutcome::Detect => {}
                RestoreOutcome::Failure(CoreError::SessionClosed) => {
                    return Err(CoreError::SessionClosed);
                }
                RestoreOutcome::Failure(e) => {
                    warn!(repeat, error = %e, "sector preparation failed");
                    return Ok(false);
                }
            }
        }

        self.inspect(None).await?;
        info!(repeat, state = %self.state(), "label inspected");
        Ok(true)
    }
}
