// Node REST API client modules
//
// Hand-written client for one inspection node: session auth, station and
// node descriptors, the loaded job, setup/repeat operations, and the
// simulator.

pub mod auth;
pub mod client;
pub mod inspection;
pub mod job;
pub mod models;
pub mod resources;
pub mod simulation;

pub use client::NodeClient;
