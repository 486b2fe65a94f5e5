//! Node event stream with auto-reconnect.
//!
//! Connects to a node's `inspection/events` WebSocket and streams decoded
//! [`NodeEvent`]s through a [`tokio::sync::broadcast`] channel. Messages the
//! node splits over several text frames are stitched back together before
//! decoding. Reconnects with exponential backoff and jitter until cancelled.
//!
//! # Example
//!
//! ```rust,ignore
//! use inspect_api::websocket::{EventStreamHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let url = endpoints.events_url()?;
//!
//! let handle = EventStreamHandle::connect(url, ReconnectConfig::default(), cancel.clone())?;
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{}: {:?}", event.name, event.kind);
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::de::IgnoredAny;
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::events::NodeEvent;

// ── Channel capacity & limits ────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Upper bound on a partially received message before it is dropped.
const MAX_MESSAGE_BYTES: usize = 4 * 1024 * 1024;

// ── StreamState ──────────────────────────────────────────────────────

/// Connection state of the event socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Connected,
    /// Shut down, or the node closed the socket cleanly.
    Closed,
    /// Last attempt failed; a reconnect is pending.
    Failed,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── EventStreamHandle ────────────────────────────────────────────────

/// Handle to a running event stream.
///
/// Call [`shutdown`](Self::shutdown) (or cancel the token passed to
/// [`connect`](Self::connect)) to tear down the background task.
pub struct EventStreamHandle {
    event_rx: broadcast::Receiver<Arc<NodeEvent>>,
    state_rx: watch::Receiver<StreamState>,
    cancel: CancellationToken,
}

impl EventStreamHandle {
    /// Spawn the connection loop for `url`.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. Watch [`state`](Self::state) to learn when it is up.
    pub fn connect(
        url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::WebSocketConnect(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(StreamState::Connecting);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(url, event_tx, state_tx, reconnect, task_cancel).await;
        });

        Ok(Self {
            event_rx,
            state_rx,
            cancel,
        })
    }

    /// Get a new receiver for the event stream.
    ///
    /// A receiver that falls behind gets
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<NodeEvent>> {
        self.event_rx.resubscribe()
    }

    /// Observe connection-state changes.
    pub fn state(&self) -> watch::Receiver<StreamState> {
        self.state_rx.clone()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn ws_loop(
    url: Url,
    event_tx: broadcast::Sender<Arc<NodeEvent>>,
    state_tx: watch::Sender<StreamState>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        state_tx.send_replace(StreamState::Connecting);

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&url, &event_tx, &state_tx, &cancel) => {
                match result {
                    // Clean close: reconnect immediately unless shutting down.
                    Ok(()) => {
                        state_tx.send_replace(StreamState::Closed);
                        if cancel.is_cancelled() {
                            break;
                        }
                        tracing::info!("event stream closed cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        state_tx.send_replace(StreamState::Failed);
                        tracing::warn!(error = %e, attempt, "event stream error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "event stream reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt = attempt.saturating_add(1);
                    }
                }
            }
        }
    }

    state_tx.send_replace(StreamState::Closed);
    tracing::debug!("event stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one connection and read messages until it drops.
async fn connect_and_read(
    url: &Url,
    event_tx: &broadcast::Sender<Arc<NodeEvent>>,
    state_tx: &watch::Sender<StreamState>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to event stream");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let (ws_stream, _response) = tokio_tungstenite::connect_async(ClientRequestBuilder::new(uri))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    state_tx.send_replace(StreamState::Connected);
    tracing::info!("event stream connected");

    let (_write, mut read) = ws_stream.split();
    let mut assembler = FrameAssembler::new(MAX_MESSAGE_BYTES);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(message) = assembler.push(text.as_str()) {
                            parse_and_broadcast(&message, event_tx);
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite answers pings itself
                        tracing::trace!("event stream ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        return close_result(frame.as_ref());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("event stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

/// A normal (or payload-less) close ends the connection cleanly; any
/// other close code is an error, so the reconnect backs off.
fn close_result(frame: Option<&CloseFrame>) -> Result<(), Error> {
    let Some(cf) = frame else {
        tracing::info!("event stream close frame received (no payload)");
        return Ok(());
    };
    tracing::info!(code = %cf.code, reason = %cf.reason, "event stream close frame received");
    if cf.code == CloseCode::Normal {
        return Ok(());
    }
    Err(Error::WebSocketClosed {
        code: u16::from(cf.code),
        reason: cf.reason.to_string(),
    })
}

// ── Message reassembly ───────────────────────────────────────────────

/// Accumulates text until it forms one complete JSON value.
///
/// A fragment that makes the buffer invalid JSON (rather than merely
/// unfinished) discards the buffer; the next fragment starts fresh.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: String,
    max_len: usize,
}

impl FrameAssembler {
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: String::new(),
            max_len,
        }
    }

    /// Feed one text frame. Returns the complete message once one is formed.
    pub fn push(&mut self, fragment: &str) -> Option<String> {
        self.buffer.push_str(fragment);

        if self.buffer.len() > self.max_len {
            tracing::warn!(
                len = self.buffer.len(),
                "event message exceeds size limit, discarding"
            );
            self.buffer.clear();
            return None;
        }

        match serde_json::from_str::<IgnoredAny>(&self.buffer) {
            Ok(_) => Some(std::mem::take(&mut self.buffer)),
            Err(e) if e.is_eof() => None,
            Err(e) => {
                tracing::debug!(error = %e, "discarding malformed event message");
                self.buffer.clear();
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Decode one complete message and broadcast it if the controller cares.
fn parse_and_broadcast(text: &str, event_tx: &broadcast::Sender<Arc<NodeEvent>>) {
    let event = match NodeEvent::from_json(text) {
        Ok(ev) => ev,
        Err(e) => {
            tracing::debug!(error = %e, "failed to decode event message");
            return;
        }
    };

    if !event.is_relevant() {
        tracing::trace!(name = %event.name, "ignoring event");
        return;
    }

    // No subscribers is fine
    let _ = event_tx.send(Arc::new(event));
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
#[allow(clippy::as_conversions, clippy::cast_precision_loss)]
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exp = i32::try_from(attempt.min(16)).unwrap_or(16);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exp);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        assert!(d10 <= Duration::from_secs(13), "got {d10:?}");
        // Far past the cap must not overflow
        let d_huge = calculate_backoff(u32::MAX, &config);
        assert!(d_huge <= Duration::from_secs(13), "got {d_huge:?}");
    }

    #[test]
    fn assembler_passes_whole_messages_through() {
        let mut asm = FrameAssembler::new(1024);
        let msg = r#"{"event":{"name":"heartbeat"}}"#;
        assert_eq!(asm.push(msg).as_deref(), Some(msg));
        assert!(asm.is_empty());
    }

    #[test]
    fn assembler_joins_split_messages() {
        let mut asm = FrameAssembler::new(1024);
        assert_eq!(asm.push(r#"{"event":{"name":"#), None);
        assert_eq!(asm.push(r#""labelEnd","data":{"repeat":"#), None);
        let whole = asm.push("5}}}").unwrap();
        assert_eq!(whole, r#"{"event":{"name":"labelEnd","data":{"repeat":5}}}"#);
    }

    #[test]
    fn assembler_braces_inside_strings_do_not_confuse_it() {
        let mut asm = FrameAssembler::new(1024);
        assert_eq!(asm.push(r#"{"event":{"name":"x}"#), None);
        assert!(asm.push(r#"","data":{}}}"#).is_some());
    }

    #[test]
    fn assembler_discards_garbage() {
        let mut asm = FrameAssembler::new(1024);
        assert_eq!(asm.push("not json"), None);
        assert!(asm.is_empty());
        assert!(asm.push(r#"{"ok":true}"#).is_some());
    }

    #[test]
    fn assembler_enforces_size_limit() {
        let mut asm = FrameAssembler::new(8);
        assert_eq!(asm.push(r#"{"a":"0123456789"#), None);
        assert!(asm.is_empty());
    }

    #[test]
    fn parse_and_broadcast_relevant_event() {
        let (tx, mut rx) = broadcast::channel(16);
        let raw = serde_json::json!({
            "event": {"source": "node1", "name": "labelBegin", "data": {"repeat": 2}}
        });

        parse_and_broadcast(&raw.to_string(), &tx);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.name, "labelBegin");
        assert_eq!(event.repeat(), Some(2));
    }

    #[test]
    fn parse_and_broadcast_skips_system_heartbeat() {
        let (tx, mut rx) = broadcast::channel::<Arc<NodeEvent>>(16);
        let raw = serde_json::json!({
            "event": {"source": "system", "name": "heartbeat", "data": {"state": "idle"}}
        });

        parse_and_broadcast(&raw.to_string(), &tx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn parse_and_broadcast_malformed_json() {
        let (tx, mut rx) = broadcast::channel::<Arc<NodeEvent>>(16);
        parse_and_broadcast("not json at all", &tx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn normal_close_is_clean() {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: String::from("bye").into(),
        };
        assert!(close_result(Some(&frame)).is_ok());
        assert!(close_result(None).is_ok());
    }

    #[test]
    fn abnormal_close_carries_code_and_reason() {
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: String::from("node restarting").into(),
        };
        let err = close_result(Some(&frame)).unwrap_err();
        assert!(matches!(
            err,
            Error::WebSocketClosed { code: 1001, ref reason } if reason == "node restarting"
        ));
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
    }

    #[test]
    fn connect_rejects_http_scheme() {
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();
        let result = EventStreamHandle::connect(url, ReconnectConfig::default(), CancellationToken::new());
        assert!(matches!(result, Err(Error::WebSocketConnect(_))));
    }
}
