//! Session controller and inspection workflows on top of `inspect-api`.
//!
//! - **[`Controller`]**: Facade for one node. [`login()`](Controller::login)
//!   authenticates, fetches the session's resources, opens the push-event
//!   stream and starts the session actor; [`logout()`](Controller::logout)
//!   tears all of it down. Job control, label processing and report
//!   retrieval are methods on the controller.
//!
//! - **Session actor**: A single task owning the event [`dispatcher`]:
//!   it applies push events to the observed [`NodeState`], publishes it over
//!   `tokio::sync::watch`, and spawns the resulting device I/O. Controller
//!   operations that wait for the node wait on those watch values with a
//!   deadline.
//!
//! - **[`ResourceCache`]** / **[`RepeatBuffer`]**: Lock-free snapshots of
//!   node resources, and the finished repeats of the current run.
//!
//! - **Domain model** ([`model`]): [`Label`], [`Repeat`], [`Session`],
//!   [`NodeState`], [`FirmwareVersion`].

mod actor;
pub mod bitmap;
pub mod cache;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod model;
mod pipeline;
mod reports;
pub mod repeats;
pub mod sectors;
pub mod simulator;
pub mod spooler;
pub mod standards;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::ResourceCache;
pub use config::{Credentials, DeviceProfile, ImageExchange, NodeConfig, SymbologySource, WaitTimeouts};
pub use controller::Controller;
pub use error::CoreError;
pub use model::{
    AccessLevel, FirmwareVersion, FullReport, Label, LabelHandler, NodeState, Repeat, SectorIntent,
    Session,
};
pub use repeats::RepeatBuffer;
pub use sectors::RestoreOutcome;
pub use spooler::PrintSpooler;
pub use standards::StandardsTable;
