// Node API response types
//
// Typed views over the JSON resources a node serves. Fields the client
// acts on are modelled; everything else is captured by `#[serde(flatten)]`
// so a fetched resource can be sent back verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Product ─────────────────────────────────────────────────────────

/// `GET /api/{root}/product` -- station firmware identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub part: Option<String>,
    #[serde(default)]
    pub version: Option<ProductVersion>,
    #[serde(default)]
    pub compile_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVersion {
    #[serde(default)]
    pub major: u32,
    #[serde(default)]
    pub minor: u32,
    #[serde(default)]
    pub service: u32,
    #[serde(default)]
    pub build: u32,
}

impl std::fmt::Display for ProductVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.service, self.build)
    }
}

// ── Devices ─────────────────────────────────────────────────────────

/// `GET /api/{root}/devices` -- nodes and cameras known to the station.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Devices {
    #[serde(default)]
    pub nodes: Vec<NodeDevice>,
    #[serde(default)]
    pub cameras: Vec<CameraDevice>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDevice {
    #[serde(default)]
    pub enumeration: i64,
    #[serde(default, rename = "cameraMAC")]
    pub camera_mac: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub manager_status: Option<String>,
    #[serde(default)]
    pub printer_model: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraDevice {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub available: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Inspection descriptor ───────────────────────────────────────────

/// `GET inspection` -- what this node is and what it is doing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// `"simulator"` on simulated nodes, the camera kind otherwise.
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub running_fw_version: Option<String>,
    #[serde(default)]
    pub system_model: Option<String>,
    #[serde(default)]
    pub device_serial_number: Option<String>,
    #[serde(default)]
    pub printer_model: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InspectionInfo {
    pub fn is_simulator(&self) -> bool {
        self.device.as_deref() == Some("simulator")
    }
}

// ── Job ─────────────────────────────────────────────────────────────

/// `GET inspection/job` -- the loaded job and its sectors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub job_version: Option<String>,
    #[serde(default)]
    pub sectors: Vec<Sector>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Sector type tag for blemish inspection.
pub const BLEMISH: &str = "blemish";

/// One inspection region of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sector {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// `verify1D`, `verify2D`, `blemish`, `ocv`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub left: i64,
    #[serde(default)]
    pub top: i64,
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
    #[serde(default)]
    pub angle: i64,
    #[serde(default)]
    pub orientation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grading_standard: Option<Value>,
    /// Present only on blemish sectors whose mask fetch succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blemish_mask: Option<Mask>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Sector {
    pub fn is_blemish(&self) -> bool {
        self.kind == BLEMISH
    }
}

/// `GET inspection/job/sectors/{name}/goldenImage/mask`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mask {
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
    #[serde(default)]
    pub states: Vec<MaskState>,
    #[serde(default)]
    pub layers: Vec<MaskLayer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskState {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub layer: i64,
}

/// One run-length-encoded mask layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskLayer {
    /// `0` marks the empty layer.
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub run_length_encode: Vec<i64>,
}

impl MaskLayer {
    pub fn is_empty_layer(&self) -> bool {
        self.value == 0
    }
}

// ── Grading standards & symbologies ─────────────────────────────────

/// `GET gradingstandards`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingStandards {
    #[serde(default)]
    pub grading_standards: Vec<GradingStandard>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingStandard {
    #[serde(default)]
    pub standard: Option<String>,
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub specifications: Option<Specifications>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specifications {
    #[serde(default)]
    pub symbology: Option<String>,
    #[serde(default)]
    pub symbol_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Region class for 1D verification sectors.
pub const VERIFY_1D: &str = "verify1D";
/// Region class for 2D verification sectors.
pub const VERIFY_2D: &str = "verify2D";

/// One entry of `GET inspection/verify/symbologies`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub symbology: String,
    #[serde(default)]
    pub symbol_type: String,
    /// `verify1D` or `verify2D`.
    #[serde(default)]
    pub region_type: String,
    #[serde(default)]
    pub directional: bool,
}

// ── Job repository ──────────────────────────────────────────────────

/// `GET repository/jobs/design/` -- jobs stored on the node.
///
/// Kept as raw JSON; [`JobList::names`] reads entries that are either
/// bare names or objects with a `name` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobList(pub Value);

impl JobList {
    pub fn names(&self) -> Vec<String> {
        let entries = match &self.0 {
            Value::Array(items) => items.as_slice(),
            Value::Object(map) => map
                .get("jobs")
                .and_then(Value::as_array)
                .map_or(&[][..], Vec::as_slice),
            _ => &[],
        };
        entries
            .iter()
            .filter_map(|e| match e {
                Value::String(name) => Some(name.clone()),
                Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(String::from),
                _ => None,
            })
            .collect()
    }
}

// ── Settings resources ──────────────────────────────────────────────

/// `GET/PUT inspection/print`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub state: bool,
    #[serde(default, rename = "override")]
    pub override_: bool,
}

/// Simulator trigger modes.
pub const SIM_MODE_CONTINUOUS: &str = "continuous";
pub const SIM_MODE_TRIGGER: &str = "trigger";

/// `GET/PUT simulation`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSettings {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub dwell_ms: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `GET configuration/camera`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    #[serde(default)]
    pub flip: Option<TypedValue<String>>,
    #[serde(default)]
    pub peel_and_present_mode: Option<TypedValue<String>>,
    #[serde(default)]
    pub name: Option<TypedValue<String>>,
    #[serde(default)]
    pub backup_void_mode: Option<TypedValue<String>>,
    #[serde(default)]
    pub backup_void_repeat_count: Option<TypedValue<i64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CameraConfig {
    /// Backup-void printing needs the printer paused between labels.
    pub fn backup_void_enabled(&self) -> bool {
        self.backup_void_mode
            .as_ref()
            .and_then(|m| m.value.as_deref())
            == Some("ON")
    }
}

/// `{"type": ..., "value": ...}` pair used by camera settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedValue<T> {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Option<T>,
}

/// `GET calibrate/video?showAll=true`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calibration {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub video_balanced: bool,
    #[serde(default)]
    pub normalization_error: bool,
    #[serde(default)]
    pub calibration_ready: bool,
    #[serde(default)]
    pub has_cal_file: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Detection ───────────────────────────────────────────────────────

/// Pixel rectangle reported by the detector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
}

/// One symbol found by setup detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub symbology: Option<String>,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub orientation: i64,
}

/// `GET inspection/setup/detect`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

// ── Repeat lists ────────────────────────────────────────────────────

/// Repeat numbers available for selection, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailableRepeats(pub Vec<u32>);

impl AvailableRepeats {
    pub fn latest(&self) -> Option<u32> {
        self.0.first().copied()
    }
}
