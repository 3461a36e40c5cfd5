//! Persistent WebSocket link with auto-reconnect.
//!
//! Connects to the fleet manager's `/api/ws` endpoint, parses inbound
//! frames at the boundary, and fans them out through a
//! [`tokio::sync::broadcast`] channel. Outbound [`ClientCommand`]s are
//! queued through an mpsc channel and written by the same background
//! task. Reconnection uses exponential backoff + jitter, with an
//! optional retry cap that ends in [`LinkState::Failed`].
//!
//! # Example
//!
//! ```rust,ignore
//! use htfleet_api::websocket::{ReconnectConfig, WebSocketHandle};
//! use htfleet_api::ClientCommand;
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let ws_url = Url::parse("ws://fleet.local:8080/api/ws")?;
//!
//! let handle = WebSocketHandle::connect(ws_url, ReconnectConfig::default(), cancel.clone());
//! let mut rx = handle.subscribe();
//!
//! handle.send(ClientCommand::SelectDevice { id: "d1".into() })?;
//! while let Ok(frame) = rx.recv().await {
//!     println!("{}", frame.kind());
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::frame::{ClientCommand, ServerFrame};

// ── Broadcast channel capacity ───────────────────────────────────────

const FRAME_CHANNEL_CAPACITY: usize = 1024;

// ── LinkState ────────────────────────────────────────────────────────

/// Observable connection state of the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// A connection attempt is in progress.
    Connecting,
    /// The link is up; commands flow and frames arrive.
    Connected,
    /// The link dropped; waiting out the backoff before attempt `attempt`.
    Reconnecting { attempt: u32 },
    /// The retry cap was exhausted. Terminal: the background task has
    /// exited and the handle will not recover.
    Failed,
}

impl LinkState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
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

// ── WebSocketHandle ──────────────────────────────────────────────────

/// Handle to a running WebSocket link.
///
/// Vends broadcast receivers for inbound frames, a watch receiver for
/// the link state, and accepts outbound commands. Call
/// [`shutdown`](Self::shutdown) to tear down the background task.
pub struct WebSocketHandle {
    frame_rx: broadcast::Receiver<Arc<ServerFrame>>,
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    state_rx: watch::Receiver<LinkState>,
    cancel: CancellationToken,
}

impl WebSocketHandle {
    /// Spawn the connection loop against `ws_url`.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. Observe progress through [`link_state`](Self::link_state).
    pub fn connect(ws_url: Url, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        let (frame_tx, frame_rx) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LinkState::Connecting);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(ws_url, frame_tx, command_rx, state_tx, reconnect, task_cancel).await;
        });

        Self {
            frame_rx,
            command_tx,
            state_rx,
            cancel,
        }
    }

    /// Get a new broadcast receiver for inbound frames.
    ///
    /// Multiple consumers can subscribe concurrently. A consumer that
    /// falls behind receives [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ServerFrame>> {
        self.frame_rx.resubscribe()
    }

    /// Subscribe to link state transitions.
    pub fn link_state(&self) -> watch::Receiver<LinkState> {
        self.state_rx.clone()
    }

    /// Whether the link is currently up.
    pub fn is_connected(&self) -> bool {
        self.state_rx.borrow().is_connected()
    }

    /// A clonable sender for queueing outbound commands without holding
    /// the handle itself.
    pub fn commands(&self) -> mpsc::UnboundedSender<ClientCommand> {
        self.command_tx.clone()
    }

    /// Queue an outbound command.
    ///
    /// Callers gate on [`is_connected`](Self::is_connected); commands
    /// queued while the link is down are discarded when a fresh
    /// connection opens (the engine re-issues its subscription itself).
    pub fn send(&self, cmd: ClientCommand) -> Result<(), Error> {
        self.command_tx.send(cmd).map_err(|_| Error::LinkClosed)
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → pump → on error, backoff → reconnect.
async fn ws_loop(
    ws_url: Url,
    frame_tx: broadcast::Sender<Arc<ServerFrame>>,
    mut command_rx: mpsc::UnboundedReceiver<ClientCommand>,
    state_tx: watch::Sender<LinkState>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = run_connection(&ws_url, &frame_tx, &mut command_rx, &state_tx, &cancel) => {
                match result {
                    // Clean disconnect (server close frame or stream ended).
                    // Reset the attempt counter and reconnect immediately.
                    Ok(()) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        tracing::info!("link closed cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "link error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "reconnection limit reached, giving up"
                                );
                                let _ = state_tx.send(LinkState::Failed);
                                return;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        let _ = state_tx.send(LinkState::Reconnecting { attempt });
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

                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("link loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one connection, then pump frames in and commands out until
/// the connection drops.
async fn run_connection(
    url: &Url,
    frame_tx: &broadcast::Sender<Arc<ServerFrame>>,
    command_rx: &mut mpsc::UnboundedReceiver<ClientCommand>,
    state_tx: &watch::Sender<LinkState>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let _ = state_tx.send(LinkState::Connecting);
    tracing::info!(url = %url, "connecting");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("link up");

    let (mut write, mut read) = ws_stream.split();

    // Discard commands that were queued while the link was down. The
    // engine observes the Connected transition and re-issues its
    // subscription, so replaying stale commands would duplicate it.
    while command_rx.try_recv().is_ok() {}

    let _ = state_tx.send(LinkState::Connected);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            cmd = command_rx.recv() => {
                // All senders dropped means the handle is gone.
                let Some(cmd) = cmd else { return Ok(()) };
                let json = serde_json::to_string(&cmd)
                    .map_err(|e| Error::MalformedFrame(e.to_string()))?;
                tracing::debug!(cmd = ?cmd, "sending command");
                write
                    .send(tungstenite::Message::text(json))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        parse_and_publish(&text, frame_tx);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite answers pongs automatically
                        tracing::trace!("ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "close frame received");
                        } else {
                            tracing::info!("close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        // Stream ended without a close frame
                        tracing::info!("stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame: ignore
                    }
                }
            }
        }
    }
}

// ── Frame publication ────────────────────────────────────────────────

/// Parse a text frame and broadcast it. Malformed frames are dropped
/// with a diagnostic; they must never stall the pump.
fn parse_and_publish(text: &str, frame_tx: &broadcast::Sender<Arc<ServerFrame>>) {
    match ServerFrame::parse(text) {
        Ok(frame) => {
            // Send errors just mean no active subscribers right now.
            let _ = frame_tx.send(Arc::new(frame));
        }
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed frame");
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread reconnection storms across clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    // Not cryptographically random, but good enough for backoff spread.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
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

        // Each step should roughly double (within jitter bounds)
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
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn publish_drops_malformed_frames() {
        let (tx, mut rx) = broadcast::channel::<Arc<ServerFrame>>(16);

        parse_and_publish("not json at all", &tx);

        // Should not panic, should just log and skip
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publish_forwards_parsed_frames() {
        let (tx, mut rx) = broadcast::channel(16);

        parse_and_publish(r#"{"type": "removed", "id": "d1"}"#, &tx);

        let frame = rx.try_recv().unwrap();
        assert_eq!(*frame, ServerFrame::Removed { id: "d1".into() });
    }
}
