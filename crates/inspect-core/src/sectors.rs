// ── Sector restoration and learning ──
//
// Before a label is inspected the job's sectors are either recreated from
// the label or learned by the node's detector. Learned sectors are built
// from `setupDetectEnd` detections and posted back to the job.

use inspect_api::node::models::{Detection, Sector, Symbol, VERIFY_1D, VERIFY_2D};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::controller::Controller;
use crate::error::CoreError;
use crate::model::{Label, SectorIntent};

/// Grading standard assumed for learned sectors.
const DEFAULT_STANDARD: &str = "GS1";
/// Table id sent when no table is requested; the node ignores it while
/// grading is disabled.
const DEFAULT_TABLE_ID: &str = "1";

/// Result of preparing a job's sectors for a label.
#[derive(Debug)]
pub enum RestoreOutcome {
    /// Sectors were recreated (or left alone).
    Success,
    /// The node's detector learned the sectors.
    Detect,
    /// Preparation stopped at the first fatal step.
    Failure(CoreError),
}

impl RestoreOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

// ── Learned sector payload ───────────────────────────────────────────

/// Body of `POST inspection/job/sectors/{name}` for a learned verify sector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedSector {
    pub name: String,
    pub username: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: u32,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
    pub angle: i64,
    pub support_matching: bool,
    pub symbology: String,
    pub match_settings: Value,
    pub grading_standard: LearnedGrading,
    pub warning_grade: f32,
    pub passing_grade: f32,
    pub orientation: i64,
    pub meta_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedGrading {
    pub enabled: bool,
    pub standard: String,
    pub table_id: String,
    pub xdim_fail_option: i64,
    pub barheight_fail_option: i64,
    pub specifications: Value,
}

impl LearnedGrading {
    fn for_table(table_id: Option<&str>) -> Self {
        let (enabled, table_id) = match table_id {
            Some(id) if !id.is_empty() => (true, id),
            _ => (false, DEFAULT_TABLE_ID),
        };
        Self {
            enabled,
            standard: DEFAULT_STANDARD.into(),
            table_id: table_id.into(),
            xdim_fail_option: 0,
            barheight_fail_option: 0,
            specifications: json!({
                "symbology": "unknown",
                "symbolType": "unknown",
                "minXdim": 0,
                "maxXdim": 0,
                "minHeightFactor": 0,
                "minHeightAbs": 0,
                "minLeftQZ": 0,
                "minRightQZ": 0,
                "minOverallGrade": 0,
                "aperture": 0,
            }),
        }
    }
}

fn default_match_settings() -> Value {
    json!({
        "dataLength": 0,
        "fieldMask": "",
        "mod10CheckDigit": 0,
        "requireFNC1": 0,
        "matchMode": 0,
        "promptUserAtStartMessage": "",
        "fixedText": "",
        "matchToSector": "",
        "matchSectorStartPosition": 1,
        "stepCharSetOption": 1,
        "stepDelta": 1,
        "stepCharSet": {
            "value0": "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789",
            "value1": "0123456789",
            "value2": "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ",
        },
        "userDefinedDataOption": 0,
        "userDefinedData": [],
        "userDefinedDataTrueSize": 0,
        "duplicateCheckOption": 2,
        "uniqueSetNumber": -1,
    })
}

/// Build verify sectors from detector output.
///
/// Detections without a region or symbology, with a symbology missing
/// from `symbols`, or whose symbology is neither 1D nor 2D are skipped.
/// 1D and 2D sectors are numbered independently from 1.
pub fn build_detected_sectors(
    detections: &[Detection],
    symbols: &[Symbol],
    table_id: Option<&str>,
) -> Vec<LearnedSector> {
    let (mut next_1d, mut next_2d) = (1_u32, 1_u32);
    let mut sectors = Vec::new();

    for detection in detections {
        let (Some(region), Some(symbology)) = (detection.region, detection.symbology.as_deref())
        else {
            continue;
        };
        if symbology.is_empty() {
            continue;
        }
        let Some(symbol) = symbols.iter().find(|s| s.symbology == symbology) else {
            debug!(symbology, "detected symbology not in table");
            continue;
        };

        let counter = match symbol.region_type.as_str() {
            VERIFY_1D => &mut next_1d,
            VERIFY_2D => &mut next_2d,
            other => {
                debug!(symbology, region_type = other, "unsupported region type");
                continue;
            }
        };
        let id = *counter;
        *counter += 1;

        let name = format!("{}_{id}", symbol.region_type);
        sectors.push(LearnedSector {
            username: capitalize(&name),
            name,
            kind: symbol.region_type.clone(),
            id,
            left: region.x,
            top: region.y,
            width: region.width,
            height: region.height,
            angle: 0,
            support_matching: true,
            symbology: symbology.to_owned(),
            match_settings: default_match_settings(),
            grading_standard: LearnedGrading::for_table(table_id),
            warning_grade: 2.5,
            passing_grade: 1.5,
            orientation: detection.orientation,
            meta_data: String::new(),
        });
    }

    sectors
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

// ── Controller operations ────────────────────────────────────────────

impl Controller {
    /// Prepare the job's sectors for `label`.
    ///
    /// Every current sector is deleted first. Detect-mode labels then run
    /// the node's detector and wait for the learned sectors; otherwise the
    /// label's sectors are recreated in order, stopping at the first
    /// failure.
    pub async fn restore_or_detect(&self, label: &Label) -> RestoreOutcome {
        if let Err(e) = self.delete_sectors().await {
            return RestoreOutcome::Failure(e);
        }

        if label.wants_detect() {
            let limit = self.inner.config.profile.waits.detect;
            return match self.detect_sectors().await {
                Ok(true) => RestoreOutcome::Detect,
                Ok(false) => RestoreOutcome::Failure(CoreError::Timeout {
                    timeout_secs: limit.as_secs(),
                }),
                Err(e) => RestoreOutcome::Failure(e),
            };
        }

        let SectorIntent::Restore(ref sectors) = label.sectors else {
            return RestoreOutcome::Success;
        };
        for sector in sectors {
            if let Err(e) = self.restore_sector(sector).await {
                warn!(sector = %sector.name, error = %e, "sector restore failed");
                return RestoreOutcome::Failure(e);
            }
        }
        debug!(count = sectors.len(), "sectors restored");
        RestoreOutcome::Success
    }

    /// Delete every sector of the freshly fetched job.
    pub async fn delete_sectors(&self) -> Result<(), CoreError> {
        let job = self.refresh_job().await?;
        for sector in &job.sectors {
            self.inner.client.delete_sector(&sector.name).await?;
        }
        debug!(count = job.sectors.len(), "sectors deleted");
        Ok(())
    }

    /// Add one sector and its blemish mask layers. A layer with value 0 may
    /// be refused by the node without failing the sector.
    async fn restore_sector(&self, sector: &Sector) -> Result<(), CoreError> {
        let client = &self.inner.client;
        client.restore_sector(sector).await?;

        let Some(ref mask) = sector.blemish_mask else {
            return Ok(());
        };
        for layer in &mask.layers {
            if let Err(e) = client.add_mask_layer(&sector.name, layer).await {
                if layer.is_empty_layer() {
                    debug!(sector = %sector.name, error = %e, "empty mask layer refused");
                } else {
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Start the node's detector and wait for the learned sectors.
    async fn detect_sectors(&self) -> Result<bool, CoreError> {
        let seen = *self.inner.detect_complete.borrow();
        self.inner.client.detect_status().await?;
        self.inner.client.start_detect().await?;

        let limit = self.inner.config.profile.waits.detect;
        self.wait_until(self.inner.detect_complete.subscribe(), limit, |n| *n > seen)
            .await
    }

    /// Create sectors from `setupDetectEnd` detections, then signal
    /// detect-complete. Individual failures are logged and skipped.
    pub(crate) async fn learn_sectors(
        &self,
        repeat: Option<u32>,
        detections: &[Detection],
        label: &Label,
    ) {
        let symbols = self.inner.cache.symbologies().unwrap_or_default();
        let sectors = build_detected_sectors(detections, &symbols, label.table_id.as_deref());
        info!(?repeat, detected = detections.len(), count = sectors.len(), "creating learned sectors");

        for sector in &sectors {
            if let Err(e) = self.inner.client.add_sector(&sector.name, sector).await {
                warn!(sector = %sector.name, error = %e, "failed to add learned sector");
            }
        }
        self.inner.detect_complete.send_modify(|n| *n += 1);
    }
}
