// ── Reactive subscription types ──
//
// Consumer-facing handles over the engine's internal channels: the
// directory's watch channel and the selection's broadcast channel.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;

use crate::directory::DirectorySnapshot;
use crate::selection::DeviceUpdate;

// ── DirectoryStream ──────────────────────────────────────────────────

/// A subscription to the device directory.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via [`changed`](Self::changed) or by converting to a
/// `Stream`.
pub struct DirectoryStream {
    current: DirectorySnapshot,
    receiver: watch::Receiver<DirectorySnapshot>,
}

impl DirectoryStream {
    pub(crate) fn new(receiver: watch::Receiver<DirectorySnapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation time.
    pub fn current(&self) -> &DirectorySnapshot {
        &self.current
    }

    /// The latest snapshot (may have changed since creation).
    pub fn latest(&self) -> DirectorySnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once the engine shuts down.
    pub async fn changed(&mut self) -> Option<DirectorySnapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> DirectoryWatchStream {
        DirectoryWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by the directory's `watch::Receiver`.
///
/// Yields a new snapshot each time the directory content changes.
pub struct DirectoryWatchStream {
    inner: WatchStream<DirectorySnapshot>,
}

impl Stream for DirectoryWatchStream {
    type Item = DirectorySnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

// ── DeviceStream ─────────────────────────────────────────────────────

/// A subscription to the selected device's telemetry updates.
///
/// Multiple streams can observe the same selection concurrently. When a
/// different device is selected, existing streams keep receiving the
/// channel's traffic, which from that point on belongs to the new
/// selection; drop the stream and select again to follow one device.
pub struct DeviceStream {
    id: String,
    receiver: broadcast::Receiver<Arc<DeviceUpdate>>,
}

impl DeviceStream {
    pub(crate) fn new(id: String, receiver: broadcast::Receiver<Arc<DeviceUpdate>>) -> Self {
        Self { id, receiver }
    }

    /// The device id this stream was created for.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next telemetry update.
    ///
    /// Returns `None` once the engine shuts down. A slow consumer that
    /// misses updates skips them and keeps going.
    pub async fn next(&mut self) -> Option<Arc<DeviceUpdate>> {
        loop {
            match self.receiver.recv().await {
                Ok(update) => return Some(update),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, id = %self.id, "telemetry consumer lagging, updates skipped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll for an already-delivered update.
    pub fn try_next(&mut self) -> Option<Arc<DeviceUpdate>> {
        loop {
            match self.receiver.try_recv() {
                Ok(update) => return Some(update),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, id = %self.id, "telemetry consumer lagging, updates skipped");
                }
                Err(_) => return None,
            }
        }
    }
}
