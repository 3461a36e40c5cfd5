// ── Ordered reactive device directory ──
//
// The client-side mirror of the fleet manager's device list. Ordering is
// the server's: `init` replaces the whole directory in server order, and
// every patch preserves the position of the record it touches. Consumers
// observe changes through a `watch` snapshot channel.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::watch;

use htfleet_api::DeviceRecord;

/// Snapshot type handed to subscribers. Cheap to clone and compare.
pub type DirectorySnapshot = Arc<Vec<Arc<DeviceRecord>>>;

/// The ordered device directory.
///
/// Keyed by device id, iteration order is insertion order (which is the
/// server's order after an `init`). Every mutation that changes content
/// rebuilds the snapshot and bumps the version counter; no-op mutations
/// publish nothing.
pub struct DeviceDirectory {
    records: Mutex<IndexMap<String, Arc<DeviceRecord>>>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    snapshot: watch::Sender<DirectorySnapshot>,

    /// Version counter, bumped on every content change.
    version: watch::Sender<u64>,
}

impl DeviceDirectory {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        let (version, _) = watch::channel(0u64);

        Self {
            records: Mutex::new(IndexMap::new()),
            snapshot,
            version,
        }
    }

    // ── Mutations (driven by inbound frames) ─────────────────────────

    /// Replace the entire directory with `records`, preserving their
    /// order. Duplicate ids keep the last occurrence.
    pub fn replace_all(&self, records: Vec<DeviceRecord>) {
        let mut map = self.lock();
        map.clear();
        for record in records {
            map.insert(record.id.clone(), Arc::new(record));
        }
        self.publish(&map);
    }

    /// Patch the `lastSeen` field of one record in place.
    ///
    /// The record keeps its position. A patch for an unknown id is
    /// dropped: a timestamp alone is not enough to conjure a record.
    pub fn patch_last_seen(&self, id: &str, last_seen: Option<DateTime<Utc>>) -> bool {
        let mut map = self.lock();
        let Some(existing) = map.get_mut(id) else {
            tracing::debug!(id, "lastSeen patch for unknown device, dropping");
            return false;
        };

        if existing.last_seen == last_seen {
            return false;
        }

        let mut updated = (**existing).clone();
        updated.last_seen = last_seen;
        *existing = Arc::new(updated);

        self.publish(&map);
        true
    }

    /// Replace a record wholesale, keeping its position, or append it if
    /// the id is new. Returns `true` if the id was new.
    pub fn upsert(&self, record: DeviceRecord) -> bool {
        let mut map = self.lock();
        let record = Arc::new(record);
        // IndexMap keeps the original slot on re-insert of an existing key.
        let is_new = map.insert(record.id.clone(), record).is_none();
        self.publish(&map);
        is_new
    }

    /// Remove a record. Idempotent: removing an unknown id publishes
    /// nothing.
    pub fn remove(&self, id: &str) -> Option<Arc<DeviceRecord>> {
        let mut map = self.lock();
        // shift_remove preserves the order of the remaining records.
        let removed = map.shift_remove(id);
        if removed.is_some() {
            self.publish(&map);
        }
        removed
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Look up a record by id.
    pub fn get(&self, id: &str) -> Option<Arc<DeviceRecord>> {
        self.lock().get(id).cloned()
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> DirectorySnapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub fn subscribe(&self) -> watch::Receiver<DirectorySnapshot> {
        self.snapshot.subscribe()
    }

    /// Current content version. Bumped once per content change.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<String, Arc<DeviceRecord>>> {
        self.records.lock().expect("directory lock poisoned")
    }

    /// Rebuild the snapshot in directory order and notify subscribers.
    fn publish(&self, map: &IndexMap<String, Arc<DeviceRecord>>) {
        let values: Vec<Arc<DeviceRecord>> = map.values().cloned().collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }
}

impl Default for DeviceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(id: &str) -> DeviceRecord {
        serde_json::from_value(serde_json::json!({"id": id})).unwrap()
    }

    fn ids(snapshot: &DirectorySnapshot) -> Vec<&str> {
        snapshot.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn replace_all_preserves_server_order() {
        let dir = DeviceDirectory::new();
        dir.replace_all(vec![record("c"), record("a"), record("b")]);

        assert_eq!(ids(&dir.snapshot()), vec!["c", "a", "b"]);
    }

    #[test]
    fn replace_all_discards_previous_contents() {
        let dir = DeviceDirectory::new();
        dir.replace_all(vec![record("old1"), record("old2")]);
        dir.replace_all(vec![record("new")]);

        assert_eq!(ids(&dir.snapshot()), vec!["new"]);
        assert!(dir.get("old1").is_none());
    }

    #[test]
    fn patch_last_seen_keeps_position() {
        let dir = DeviceDirectory::new();
        dir.replace_all(vec![record("a"), record("b"), record("c")]);

        let ts = "2024-01-01T00:00:00Z".parse().unwrap();
        assert!(dir.patch_last_seen("b", Some(ts)));

        assert_eq!(ids(&dir.snapshot()), vec!["a", "b", "c"]);
        assert_eq!(dir.get("b").unwrap().last_seen, Some(ts));
    }

    #[test]
    fn patch_last_seen_unknown_id_is_dropped() {
        let dir = DeviceDirectory::new();
        dir.replace_all(vec![record("a")]);
        let before = dir.version();

        let ts = "2024-01-01T00:00:00Z".parse().unwrap();
        assert!(!dir.patch_last_seen("ghost", Some(ts)));

        // No phantom record, no spurious publish.
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.version(), before);
    }

    #[test]
    fn patch_last_seen_same_value_publishes_nothing() {
        let dir = DeviceDirectory::new();
        dir.replace_all(vec![record("a")]);
        let before = dir.version();

        assert!(!dir.patch_last_seen("a", None));
        assert_eq!(dir.version(), before);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let dir = DeviceDirectory::new();
        dir.replace_all(vec![record("a"), record("b"), record("c")]);

        let mut updated = record("b");
        updated.description = "renamed".into();
        assert!(!dir.upsert(updated));

        assert_eq!(ids(&dir.snapshot()), vec!["a", "b", "c"]);
        assert_eq!(dir.get("b").unwrap().description, "renamed");
    }

    #[test]
    fn upsert_appends_new_record() {
        let dir = DeviceDirectory::new();
        dir.replace_all(vec![record("a")]);

        assert!(dir.upsert(record("z")));
        assert_eq!(ids(&dir.snapshot()), vec!["a", "z"]);
    }

    #[test]
    fn remove_preserves_remaining_order() {
        let dir = DeviceDirectory::new();
        dir.replace_all(vec![record("a"), record("b"), record("c")]);

        assert!(dir.remove("b").is_some());
        assert_eq!(ids(&dir.snapshot()), vec!["a", "c"]);
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = DeviceDirectory::new();
        dir.replace_all(vec![record("a")]);

        assert!(dir.remove("ghost").is_none());
        let before = dir.version();
        assert!(dir.remove("ghost").is_none());
        assert_eq!(dir.version(), before);
    }

    #[test]
    fn subscribers_see_new_snapshots() {
        let dir = DeviceDirectory::new();
        let rx = dir.subscribe();
        assert!(rx.borrow().is_empty());

        dir.replace_all(vec![record("a")]);
        assert_eq!(ids(&rx.borrow()), vec!["a"]);
    }

    #[test]
    fn version_counts_content_changes() {
        let dir = DeviceDirectory::new();
        assert_eq!(dir.version(), 0);

        dir.replace_all(vec![record("a")]);
        dir.upsert(record("b"));
        dir.remove("a");

        assert_eq!(dir.version(), 3);
    }
}
