// ── Domain model ──
//
// Controller-side types: observed node state, the session, labels handed
// in by callers, and the repeats assembled from push events. Wire shapes
// live in `inspect_api::node::models`.

pub mod label;
pub mod repeat;
pub mod session;
pub mod state;
pub mod version;

// ── Re-exports ──────────────────────────────────────────────────────

pub use label::{Label, LabelHandler, RepeatCallback, SectorIntent};
pub use repeat::{FullReport, Repeat};
pub use session::{AccessLevel, Session};
pub use state::NodeState;
pub use version::FirmwareVersion;
