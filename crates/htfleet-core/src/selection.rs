// ── Selected-device telemetry channel ──
//
// At most one device is "selected" at a time; the server only streams
// telemetry (status, diagnostics, topics, values) for that device.
// Updates fan out to any number of subscribers through a broadcast
// channel. Frames carrying another device's id are dropped here: they
// are leftovers from a previous selection still in flight.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use htfleet_api::DeviceRecord;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// A telemetry update for the selected device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceUpdate {
    /// Full record replacement (also delivered from cache on selection).
    Info(Arc<DeviceRecord>),
    /// Free-form status text.
    Status(serde_json::Value),
    /// Diagnostics payload.
    Diag(serde_json::Value),
    /// Topic tree.
    Topics(serde_json::Value),
    /// Bulk topic values.
    Values(serde_json::Value),
    /// A single topic value change.
    Value(serde_json::Value),
}

impl DeviceUpdate {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Info(_) => "info",
            Self::Status(_) => "status",
            Self::Diag(_) => "diag",
            Self::Topics(_) => "topics",
            Self::Values(_) => "values",
            Self::Value(_) => "value",
        }
    }
}

/// The selection state plus its fan-out channel.
pub(crate) struct SelectionChannel {
    selected: Mutex<Option<String>>,
    updates: broadcast::Sender<Arc<DeviceUpdate>>,
}

impl SelectionChannel {
    pub(crate) fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            selected: Mutex::new(None),
            updates,
        }
    }

    /// The currently selected device id, if any.
    pub(crate) fn selected(&self) -> Option<String> {
        self.lock().clone()
    }

    /// Select `id`, returning a fresh subscription to its updates.
    /// Replaces any previous selection.
    pub(crate) fn select(&self, id: &str) -> broadcast::Receiver<Arc<DeviceUpdate>> {
        let mut guard = self.lock();
        if guard.as_deref() != Some(id) {
            tracing::debug!(id, previous = ?*guard, "selection changed");
        }
        *guard = Some(id.to_owned());
        self.updates.subscribe()
    }

    /// Subscribe to the current selection's updates without changing it.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Arc<DeviceUpdate>> {
        self.updates.subscribe()
    }

    /// Clear the selection, returning the previously selected id.
    pub(crate) fn clear(&self) -> Option<String> {
        self.lock().take()
    }

    /// Publish an update unconditionally (used for cached-info delivery
    /// at selection time).
    pub(crate) fn publish(&self, update: DeviceUpdate) {
        // Send errors just mean no active subscribers right now.
        let _ = self.updates.send(Arc::new(update));
    }

    /// Forward an update if `id` matches the current selection.
    /// Returns `false` (and drops the update) otherwise.
    pub(crate) fn forward(&self, id: &str, update: DeviceUpdate) -> bool {
        if self.lock().as_deref() != Some(id) {
            tracing::trace!(id, kind = update.kind(), "update for unselected device, dropping");
            return false;
        }
        self.publish(update);
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.selected.lock().expect("selection lock poisoned")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn forward_matches_selected_id_only() {
        let channel = SelectionChannel::new();
        let mut rx = channel.select("d1");

        assert!(channel.forward("d1", DeviceUpdate::Status(json!("on"))));
        assert!(!channel.forward("d2", DeviceUpdate::Status(json!("off"))));

        let update = rx.try_recv().unwrap();
        assert_eq!(*update, DeviceUpdate::Status(json!("on")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn forward_without_selection_drops_everything() {
        let channel = SelectionChannel::new();
        let mut rx = channel.subscribe();

        assert!(!channel.forward("d1", DeviceUpdate::Status(json!("on"))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reselect_replaces_previous_selection() {
        let channel = SelectionChannel::new();
        let _rx1 = channel.select("d1");
        let mut rx2 = channel.select("d2");

        assert_eq!(channel.selected().as_deref(), Some("d2"));
        assert!(!channel.forward("d1", DeviceUpdate::Status(json!("stale"))));
        assert!(channel.forward("d2", DeviceUpdate::Status(json!("fresh"))));

        assert_eq!(*rx2.try_recv().unwrap(), DeviceUpdate::Status(json!("fresh")));
    }

    #[test]
    fn multiple_subscribers_each_see_updates() {
        let channel = SelectionChannel::new();
        let mut rx1 = channel.select("d1");
        let mut rx2 = channel.subscribe();

        channel.forward("d1", DeviceUpdate::Value(json!({"relay": "on"})));

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn clear_returns_previous_id() {
        let channel = SelectionChannel::new();
        let _rx = channel.select("d1");

        assert_eq!(channel.clear().as_deref(), Some("d1"));
        assert!(channel.selected().is_none());
        assert!(channel.clear().is_none());
    }
}
