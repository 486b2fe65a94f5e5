// ── Repeats and reports ──
//
// Inspection, report retrieval, and delivery of finished repeats to the
// label that produced them.

use std::sync::Arc;

use bytes::Bytes;
use inspect_api::node::models::Job;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::bitmap;
use crate::controller::Controller;
use crate::error::CoreError;
use crate::model::{FullReport, Label, NodeState, Repeat};

/// Key stamped into job snapshots with the firmware version.
const JOB_VERSION_KEY: &str = "jobVersion";

impl Controller {
    /// Newest repeat the node offers for the current state, or 0 when it
    /// offers none.
    pub async fn latest_repeat(&self) -> Result<u32, CoreError> {
        let client = &self.inner.client;
        let available = if self.state() == NodeState::Running {
            client.run_repeats().await?
        } else {
            client.setup_repeats().await?
        };
        Ok(available.latest().unwrap_or(0))
    }

    /// Inspect the selected image, selecting `repeat` first when given.
    pub async fn inspect(&self, repeat: Option<u32>) -> Result<(), CoreError> {
        if let Some(n) = repeat.filter(|n| *n > 0) {
            self.inner.client.select_repeat(n).await?;
        }
        self.inner.client.inspect().await?;
        Ok(())
    }

    /// Fetch the report for `repeat` (default: the newest).
    ///
    /// While editing the node only has the setup report. The image is
    /// optional and gets the node's dpi written into its header; the job
    /// snapshot is re-fetched and stamped with the firmware version.
    pub async fn full_report(
        &self,
        repeat: Option<u32>,
        with_image: bool,
    ) -> Result<FullReport, CoreError> {
        let number = self.resolve_repeat(repeat).await?;
        let client = &self.inner.client;

        let report = if self.state() == NodeState::Editing {
            client.setup_report().await?
        } else {
            client.repeat_report(number).await?
        };

        let image = if with_image {
            self.repeat_image(number).await
        } else {
            None
        };

        let job = match self.refresh_job().await {
            Ok(job) => Some(self.stamp_job(&job)?),
            Err(e) => {
                warn!(error = %e, "failed to fetch job snapshot");
                None
            }
        };

        Ok(FullReport { report, job, image })
    }

    /// Inspect (while editing) and fetch the report. A paused node gets the
    /// repeat removed and is resumed.
    pub async fn inspect_get_report(
        &self,
        repeat: Option<u32>,
        with_image: bool,
    ) -> Result<FullReport, CoreError> {
        let number = self.resolve_repeat(repeat).await?;

        if self.state() == NodeState::Editing && number != 0 {
            self.inspect(Some(number)).await?;
        }

        let report = self.full_report(Some(number), with_image).await?;

        if self.state() == NodeState::Paused {
            self.inner.client.remove_repeat(number).await?;
            self.inner.client.resume_job().await?;
        }
        Ok(report)
    }

    /// Remove the newest repeat and resume the job. `Ok(false)` when there
    /// is no repeat.
    pub async fn remove_repeat(&self) -> Result<bool, CoreError> {
        let number = self.latest_repeat().await?;
        if number == 0 {
            return Ok(false);
        }
        self.inner.client.remove_repeat(number).await?;
        self.inner.client.resume_job().await?;
        debug!(repeat = number, "repeat removed");
        Ok(true)
    }

    /// A buffered repeat of the current run.
    pub fn repeat(&self, number: u32) -> Option<Arc<Repeat>> {
        self.inner.repeats.get(number)
    }

    /// Every buffered repeat of the current run, lowest number first.
    pub fn repeats(&self) -> Vec<Arc<Repeat>> {
        self.inner.repeats.snapshot()
    }

    /// Fetch the report for a finished label, buffer the repeat and hand it
    /// to the label's callback.
    pub(crate) async fn deliver_repeat(&self, number: u32, label: Arc<Label>, generation: u64) {
        let report = match self.full_report(Some(number), true).await {
            Ok(report) => report,
            Err(e) => {
                error!(repeat = number, error = %e, "unable to read the repeat report");
                return;
            }
        };
        if report.job.is_none() {
            error!(repeat = number, "repeat report has no job snapshot");
            return;
        }

        let mut repeat = Repeat::new(number, label);
        repeat.report = Some(report);
        let repeat = Arc::new(repeat);

        if !self.inner.repeats.insert(generation, Arc::clone(&repeat)) {
            debug!(repeat = number, "repeat belongs to a finished run, not buffered");
        }
        repeat.label.notify(Arc::clone(&repeat));
    }

    async fn resolve_repeat(&self, repeat: Option<u32>) -> Result<u32, CoreError> {
        match repeat {
            Some(n) if n > 0 => Ok(n),
            _ => self.latest_repeat().await,
        }
    }

    async fn repeat_image(&self, number: u32) -> Option<Bytes> {
        let image = match self.inner.client.repeat_image(number).await {
            Ok(image) => image,
            Err(e) => {
                warn!(repeat = number, error = %e, "failed to fetch repeat image");
                return None;
            }
        };
        let Some(dpi) = self.dpi() else {
            return Some(image);
        };
        let mut buf = image.to_vec();
        if !bitmap::set_dpi(&mut buf, dpi) {
            debug!(repeat = number, len = buf.len(), "image too short for a BMP header");
        }
        Some(Bytes::from(buf))
    }

    fn stamp_job(&self, job: &Job) -> Result<Value, CoreError> {
        let mut value = serde_json::to_value(job).map_err(|e| CoreError::Payload {
            message: e.to_string(),
        })?;
        if let Value::Object(ref mut map) = value {
            map.insert(
                JOB_VERSION_KEY.into(),
                Value::String(self.inner.cache.firmware_version_string()),
            );
        }
        Ok(value)
    }
}
