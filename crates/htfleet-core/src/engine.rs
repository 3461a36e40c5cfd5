// ── Engine lifecycle ──
//
// `DeviceManager` owns the WebSocket link and the two state sinks
// (directory, selection), and wires them together with two background
// tasks: a bridge that routes inbound frames, and a link watcher that
// replays the subscription whenever a connection (re)opens. Commands
// queued while the link was down are discarded by the transport, so
// the replay here is the single source of truth after a reconnect.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use htfleet_api::websocket::WebSocketHandle;
use htfleet_api::{ClientCommand, LinkState, RestClient, ServerFrame, transport};

use crate::config::ManagerConfig;
use crate::directory::{DeviceDirectory, DirectorySnapshot};
use crate::dispatch::dispatch;
use crate::error::CoreError;
use crate::pending::{PendingAction, PendingSlot};
use crate::selection::{DeviceUpdate, SelectionChannel};
use crate::stream::{DeviceStream, DirectoryStream};

use htfleet_api::DeviceRecord;

// ── DeviceManager ────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc`. Opens its WebSocket link immediately on
/// [`connect`](Self::connect) and keeps the device directory current
/// until [`shutdown`](Self::shutdown).
#[derive(Clone)]
pub struct DeviceManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: ManagerConfig,
    directory: DeviceDirectory,
    selection: SelectionChannel,
    pending: PendingSlot,
    /// Outbound command queue into the transport.
    commands: mpsc::UnboundedSender<ClientCommand>,
    state_rx: watch::Receiver<LinkState>,
    rest: RestClient,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DeviceManager {
    /// Connect to the fleet manager at `config.base_url`.
    ///
    /// Returns immediately after spawning the link; the first directory
    /// snapshot arrives once the server sends its `init` frame. Observe
    /// progress through [`link_state`](Self::link_state).
    pub fn connect(config: ManagerConfig) -> Result<Self, CoreError> {
        let ws_url = transport::websocket_url(&config.base_url)?;
        let rest = RestClient::new(config.base_url.clone(), &config.transport())?;

        let cancel = CancellationToken::new();
        let handle = WebSocketHandle::connect(ws_url, config.reconnect.clone(), cancel.clone());

        let frames = handle.subscribe();
        let commands = handle.commands();
        let state_rx = handle.link_state();

        let inner = Arc::new(ManagerInner {
            config,
            directory: DeviceDirectory::new(),
            selection: SelectionChannel::new(),
            pending: PendingSlot::new(),
            commands,
            state_rx: state_rx.clone(),
            rest,
            cancel,
            task_handles: Mutex::new(Vec::new()),
        });

        let bridge = tokio::spawn(bridge_task(Arc::clone(&inner), frames));
        let link = tokio::spawn(link_task(Arc::clone(&inner), state_rx));
        inner.push_task(bridge);
        inner.push_task(link);

        Ok(Self { inner })
    }

    /// The engine configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// The REST client sharing this manager's transport settings.
    pub fn rest(&self) -> &RestClient {
        &self.inner.rest
    }

    // ── Directory access ─────────────────────────────────────────────

    /// Subscribe to the live device directory.
    pub fn devices(&self) -> DirectoryStream {
        DirectoryStream::new(self.inner.directory.subscribe())
    }

    /// The current directory snapshot, in server order.
    pub fn devices_snapshot(&self) -> DirectorySnapshot {
        self.inner.directory.snapshot()
    }

    /// Look up one device by id.
    pub fn device(&self, id: &str) -> Option<Arc<DeviceRecord>> {
        self.inner.directory.get(id)
    }

    // ── Selection ────────────────────────────────────────────────────

    /// Select `id` for telemetry and return a stream of its updates.
    ///
    /// Replaces any previous selection. If the device is already in the
    /// directory, its cached record is delivered as the first `Info`
    /// update. While the link is down the subscription command is
    /// deferred and replayed when the connection opens.
    pub fn select(&self, id: &str) -> DeviceStream {
        let rx = self.inner.selection.select(id);

        if let Some(record) = self.inner.directory.get(id) {
            self.inner.selection.publish(DeviceUpdate::Info(record));
        }

        if self.is_connected() {
            // An action deferred before the link came up is now stale;
            // the command sent here supersedes it.
            let _ = self.inner.pending.take();
            self.inner.send_command(ClientCommand::SelectDevice { id: id.to_owned() });
        } else {
            debug!(id, "link down, deferring selection");
            self.inner
                .pending
                .store(PendingAction::Select { id: id.to_owned() });
        }

        DeviceStream::new(id.to_owned(), rx)
    }

    /// Clear the current selection and tell the server to stop streaming
    /// telemetry for `id`.
    ///
    /// The id is passed through as given; it is not checked against the
    /// current selection. While the link is down the command is deferred.
    pub fn unselect(&self, id: &str) {
        self.inner.selection.clear();

        if self.is_connected() {
            let _ = self.inner.pending.take();
            self.inner
                .send_command(ClientCommand::UnselectDevice { id: id.to_owned() });
        } else {
            debug!(id, "link down, deferring unselect");
            self.inner
                .pending
                .store(PendingAction::Unselect { id: id.to_owned() });
        }
    }

    /// Observe the current selection's telemetry without changing it.
    ///
    /// Returns `None` when nothing is selected. Each call gets an
    /// independent stream; a new selection is visible to all of them.
    pub fn observe_selected(&self) -> Option<DeviceStream> {
        let id = self.inner.selection.selected()?;
        Some(DeviceStream::new(id, self.inner.selection.subscribe()))
    }

    /// The currently selected device id, if any.
    pub fn selected(&self) -> Option<String> {
        self.inner.selection.selected()
    }

    // ── Link state ───────────────────────────────────────────────────

    /// Subscribe to link state transitions.
    pub fn link_state(&self) -> watch::Receiver<LinkState> {
        self.inner.state_rx.clone()
    }

    /// Whether the WebSocket link is currently up.
    pub fn is_connected(&self) -> bool {
        self.inner.state_rx.borrow().is_connected()
    }

    // ── Shutdown ─────────────────────────────────────────────────────

    /// Stop the link and background tasks. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self
                .inner
                .task_handles
                .lock()
                .expect("task handle lock poisoned");
            guard.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl ManagerInner {
    fn push_task(&self, handle: JoinHandle<()>) {
        self.task_handles
            .lock()
            .expect("task handle lock poisoned")
            .push(handle);
    }

    fn send_command(&self, cmd: ClientCommand) {
        debug!(?cmd, "sending subscription command");
        // A closed channel means the link task already exited; the
        // state watcher surfaces that as Failed.
        let _ = self.commands.send(cmd);
    }

    /// Re-establish the server-side selection after a (re)connect.
    ///
    /// A deferred action wins over the standing selection; otherwise the
    /// standing selection is re-issued, since the fresh connection has
    /// no server-side state.
    fn replay_subscription(&self) {
        let cmd = match self.pending.take() {
            Some(action) => Some(action.into_command()),
            None => self
                .selection
                .selected()
                .map(|id| ClientCommand::SelectDevice { id }),
        };

        if let Some(cmd) = cmd {
            debug!(?cmd, "replaying subscription after connect");
            let _ = self.commands.send(cmd);
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Route inbound frames into the directory and selection channel.
async fn bridge_task(inner: Arc<ManagerInner>, mut frames: broadcast::Receiver<Arc<ServerFrame>>) {
    loop {
        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            frame = frames.recv() => match frame {
                Ok(frame) => dispatch(&frame, &inner.directory, &inner.selection),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "frame consumer lagging, directory may be stale until next init");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
    debug!("bridge task exiting");
}

/// Watch link transitions: replay the subscription on connect, surface
/// terminal failure.
async fn link_task(inner: Arc<ManagerInner>, mut state_rx: watch::Receiver<LinkState>) {
    loop {
        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                match state {
                    LinkState::Connected => inner.replay_subscription(),
                    LinkState::Failed => {
                        error!("link permanently failed, directory is frozen");
                    }
                    LinkState::Connecting | LinkState::Reconnecting { .. } => {}
                }
            }
        }
    }
    debug!("link task exiting");
}
