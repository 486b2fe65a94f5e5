//! Typed push events.
//!
//! A node pushes JSON messages shaped `{"event": {time, source, item, name,
//! data}}` over its event socket. Each message is decoded once, here, into a
//! [`NodeEvent`] whose [`EventKind`] is a closed set; names this crate does
//! not know become [`EventKind::Unknown`] rather than an error.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::node::models::Detection;

/// Source tag of station-wide events (as opposed to a node's own).
pub const SYSTEM_SOURCE: &str = "system";

// ── NodeEvent ────────────────────────────────────────────────────────

/// One decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEvent {
    /// Device timestamp, passed through as sent.
    pub time: Option<String>,
    /// Emitting component: `"system"` or a node identifier.
    pub source: Option<String>,
    pub item: i64,
    /// Raw event name, e.g. `"stateChange"`.
    pub name: String,
    pub kind: EventKind,
}

/// Closed set of event shapes the controller reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Periodic status. `state` is the device state string.
    Heartbeat {
        state: Option<String>,
        current_dpi: Option<u32>,
    },
    /// Explicit lifecycle transition.
    StateChange { from: String, to: String },
    /// Some session on the node logged in or out.
    SessionStateChange {
        token: Option<String>,
        user_id: Option<String>,
        access_level: Option<String>,
        state: Option<String>,
    },
    LabelBegin { repeat: Option<u32> },
    LabelEnd { repeat: Option<u32> },
    /// A setup image was captured while editing.
    SetupCapture { repeat: Option<u32> },
    SetupDetectBegin,
    /// Intermediate detection notices (`setupDetectStart`, `setupDetect`).
    SetupDetectProgress,
    /// Detection finished; `detections` lists the symbols found.
    SetupDetectEnd {
        repeat: Option<u32>,
        detections: Vec<Detection>,
    },
    SectorBegin,
    SectorEnd,
    /// Any other name. The raw `data` object is kept for logging.
    Unknown { data: Value },
}

impl NodeEvent {
    /// Decode one complete message.
    ///
    /// Accepts the `{"event": {...}}` envelope as well as a bare event
    /// object.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        if let Some(inner) = value.get_mut("event").map(Value::take) {
            value = inner;
        }
        let raw: RawEvent = serde_json::from_value(value)?;
        Ok(raw.into())
    }

    /// Whether the controller should see this event at all.
    ///
    /// Events without a source and station-wide heartbeats are noise.
    pub fn is_relevant(&self) -> bool {
        match self.source.as_deref() {
            None => false,
            Some(SYSTEM_SOURCE) => !matches!(self.kind, EventKind::Heartbeat { .. }),
            Some(_) => true,
        }
    }

    /// Repeat number carried by label and capture events.
    pub fn repeat(&self) -> Option<u32> {
        match &self.kind {
            EventKind::LabelBegin { repeat }
            | EventKind::LabelEnd { repeat }
            | EventKind::SetupCapture { repeat }
            | EventKind::SetupDetectEnd { repeat, .. } => *repeat,
            _ => None,
        }
    }
}

// ── Wire shapes ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default, deserialize_with = "lenient_string")]
    time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    source: Option<String>,
    #[serde(default)]
    item: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    data: Value,
}

/// Union of every `data` field any event carries.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawData {
    #[serde(default, deserialize_with = "lenient_string")]
    token: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    access_level: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    state: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    repeat: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    from_state: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    to_state: Option<String>,
    #[serde(default, rename = "Current_dpi", deserialize_with = "lenient_u32")]
    current_dpi: Option<u32>,
    #[serde(default)]
    detections: Vec<Detection>,
}

impl From<RawEvent> for NodeEvent {
    fn from(raw: RawEvent) -> Self {
        let data: RawData = if raw.data.is_object() {
            serde_json::from_value(raw.data.clone()).unwrap_or_else(|e| {
                tracing::debug!(error = %e, name = %raw.name, "event data did not match known fields");
                RawData::default()
            })
        } else {
            RawData::default()
        };

        let kind = match raw.name.as_str() {
            "heartbeat" => EventKind::Heartbeat {
                state: data.state,
                current_dpi: data.current_dpi,
            },
            "stateChange" => EventKind::StateChange {
                from: data.from_state.unwrap_or_default(),
                to: data.to_state.unwrap_or_default(),
            },
            "sessionStateChange" => EventKind::SessionStateChange {
                token: data.token,
                user_id: data.id,
                access_level: data.access_level,
                state: data.state,
            },
            "labelBegin" => EventKind::LabelBegin { repeat: data.repeat },
            "labelEnd" => EventKind::LabelEnd { repeat: data.repeat },
            "setupCapture" => EventKind::SetupCapture { repeat: data.repeat },
            "setupDetectBegin" => EventKind::SetupDetectBegin,
            "setupDetectEnd" => EventKind::SetupDetectEnd {
                repeat: data.repeat,
                detections: data.detections,
            },
            name if name.starts_with("setupDetect") => EventKind::SetupDetectProgress,
            "sectorBegin" => EventKind::SectorBegin,
            "sectorEnd" => EventKind::SectorEnd,
            _ => EventKind::Unknown { data: raw.data },
        };

        Self {
            time: raw.time,
            source: raw.source,
            item: raw.item,
            name: raw.name,
            kind,
        }
    }
}

// ── Lenient scalars ──────────────────────────────────────────────────

/// Firmware sends some fields as strings on one version and numbers on the
/// next; accept either.
fn lenient_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

#[allow(
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn lenient_u32<'de, D: Deserializer<'de>>(de: D) -> Result<Option<u32>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(|f| {
            if f >= 0.0 && f <= f64::from(u32::MAX) {
                Some(f.round() as u32)
            } else {
                None
            }
        }),
        _ => None,
    })
}

// ── Tests ────────────────────────────────────────────────────────────
