// inspect-api: Async Rust client for print-inspection node APIs (REST + event stream)

pub mod endpoints;
pub mod error;
pub mod events;
pub mod node;
pub mod transport;
pub mod websocket;

pub use endpoints::NodeEndpoints;
pub use error::{Error, ErrorKind};
pub use events::{EventKind, NodeEvent};
pub use node::NodeClient;
pub use transport::TransportConfig;
