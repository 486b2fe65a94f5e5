// Job and sector endpoints
//
// The loaded job, its sectors and blemish masks, the job repository, and
// the run-control commands (load/unload/start/stop/pause/resume).

use tracing::warn;

use crate::error::Error;
use crate::node::NodeClient;
use crate::node::models::{Job, Mask, MaskLayer, Sector};

/// Body `inspection/job/isrunready` returns when a job may start.
pub const RUN_READY: &str = "OK";

impl NodeClient {
    // ── Loaded job ───────────────────────────────────────────────────

    /// `GET inspection/job` without sector masks.
    pub async fn job(&self) -> Result<Job, Error> {
        let url = self.node_url(&["inspection", "job"])?;
        self.get_json(url).await
    }

    /// `GET inspection/job`, then merge in the mask of every blemish sector.
    ///
    /// A failed mask fetch leaves that sector's mask absent.
    pub async fn job_with_masks(&self) -> Result<Job, Error> {
        let mut job = self.job().await?;
        for sector in job.sectors.iter_mut().filter(|s| s.is_blemish()) {
            match self.sector_mask(&sector.name).await {
                Ok(mask) => sector.blemish_mask = Some(mask),
                Err(e) => {
                    warn!(sector = %sector.name, error = %e, "failed to fetch sector mask");
                }
            }
        }
        Ok(job)
    }

    // ── Sectors ──────────────────────────────────────────────────────

    /// `POST inspection/job/sectors/{name}`
    pub async fn add_sector(&self, name: &str, body: &(impl serde::Serialize + Sync)) -> Result<(), Error> {
        let url = self.node_url(&["inspection", "job", "sectors", name])?;
        self.post_json(url, body).await
    }

    /// Add a fully-specified sector under its own name.
    pub async fn restore_sector(&self, sector: &Sector) -> Result<(), Error> {
        self.add_sector(&sector.name, sector).await
    }

    /// `DELETE inspection/job/sectors/{name}`
    pub async fn delete_sector(&self, name: &str) -> Result<(), Error> {
        let url = self.node_url(&["inspection", "job", "sectors", name])?;
        self.delete(url).await
    }

    /// `GET inspection/job/sectors/{name}/goldenImage/mask`
    pub async fn sector_mask(&self, name: &str) -> Result<Mask, Error> {
        let url = self.mask_url(name)?;
        self.get_json(url).await
    }

    /// `PATCH inspection/job/sectors/{name}/goldenImage/mask` with one layer.
    pub async fn add_mask_layer(&self, name: &str, layer: &MaskLayer) -> Result<(), Error> {
        let url = self.mask_url(name)?;
        self.patch_json(url, layer).await
    }

    fn mask_url(&self, name: &str) -> Result<url::Url, Error> {
        self.node_url(&["inspection", "job", "sectors", name, "goldenImage", "mask"])
    }

    // ── Run control ──────────────────────────────────────────────────

    /// `GET inspection/job/isrunready` -- `true` when the node answers `OK`.
    pub async fn is_run_ready(&self) -> Result<bool, Error> {
        let url = self.node_url(&["inspection", "job", "isrunready"])?;
        let body = self.get_text(url).await?;
        Ok(body.trim().trim_matches('"') == RUN_READY)
    }

    /// `PUT repository/jobs/design/{job}?source=inspection` -- move the
    /// edited job into the run slot.
    pub async fn run_job(&self, name: &str) -> Result<(), Error> {
        let mut url = self.node_url(&["repository", "jobs", "design", name])?;
        url.query_pairs_mut().append_pair("source", "inspection");
        self.put_text(url, "").await
    }

    /// `PUT inspection/job/load` with body `design/{name}`.
    pub async fn load_job(&self, name: &str) -> Result<(), Error> {
        let url = self.node_url(&["inspection", "job", "load"])?;
        self.put_text(url, &format!("design/{name}")).await
    }

    /// `PUT inspection/job/unload`
    pub async fn unload_job(&self) -> Result<(), Error> {
        self.job_command("unload").await
    }

    /// `PUT inspection/job/start`
    pub async fn start_job(&self) -> Result<(), Error> {
        self.job_command("start").await
    }

    /// `PUT inspection/job/pause`
    pub async fn pause_job(&self) -> Result<(), Error> {
        self.job_command("pause").await
    }

    /// `PUT inspection/job/resume`
    pub async fn resume_job(&self) -> Result<(), Error> {
        self.job_command("resume").await
    }

    /// `PUT inspection/job/stop?finalizeActive=0` -- returns the node to editing.
    pub async fn stop_job(&self) -> Result<(), Error> {
        let mut url = self.node_url(&["inspection", "job", "stop"])?;
        url.query_pairs_mut().append_pair("finalizeActive", "0");
        self.put_text(url, "").await
    }

    async fn job_command(&self, command: &str) -> Result<(), Error> {
        let url = self.node_url(&["inspection", "job", command])?;
        self.put_text(url, "").await
    }
}
