// ── Repeats ──

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::label::Label;

/// Everything the node knows about one inspected repeat.
#[derive(Debug, Clone, Default)]
pub struct FullReport {
    /// Setup or repeat report, verbatim.
    pub report: Value,
    /// Job snapshot stamped with the firmware `jobVersion`.
    pub job: Option<Value>,
    /// BMP with the resolution fields set to the node's dpi.
    pub image: Option<Bytes>,
}

/// One inspection cycle, numbered by the node.
#[derive(Debug, Clone)]
pub struct Repeat {
    pub number: u32,
    pub label: Arc<Label>,
    pub report: Option<FullReport>,
    pub completed_at: DateTime<Utc>,
}

impl Repeat {
    pub fn new(number: u32, label: Arc<Label>) -> Self {
        Self {
            number,
            label,
            report: None,
            completed_at: Utc::now(),
        }
    }
}
