// ── Frame routing ──
//
// One inbound frame, one routing decision. Directory frames mutate the
// ordered directory; telemetry frames go to the selection channel,
// which drops them unless their id matches the current selection.
// Unknown frame types are logged and discarded.

use htfleet_api::ServerFrame;

use crate::directory::DeviceDirectory;
use crate::selection::{DeviceUpdate, SelectionChannel};

/// Apply one inbound frame to the engine's state.
pub(crate) fn dispatch(
    frame: &ServerFrame,
    directory: &DeviceDirectory,
    selection: &SelectionChannel,
) {
    match frame {
        ServerFrame::Init(records) => {
            tracing::debug!(count = records.len(), "directory snapshot received");
            directory.replace_all(records.clone());

            // The snapshot may carry fresher data for the selected
            // device; surface it on the telemetry channel too.
            if let Some(id) = selection.selected() {
                if let Some(record) = directory.get(&id) {
                    selection.publish(DeviceUpdate::Info(record));
                }
            }
        }
        ServerFrame::LastSeen { id, last_seen } => {
            directory.patch_last_seen(id, *last_seen);
        }
        ServerFrame::Info { id, record } => {
            directory.upsert(record.clone());
            if let Some(current) = directory.get(id) {
                selection.forward(id, DeviceUpdate::Info(current));
            }
        }
        ServerFrame::Removed { id } => {
            if directory.remove(id).is_some() {
                tracing::debug!(id, "device removed");
            }
        }
        ServerFrame::Status { id, data } => {
            selection.forward(id, DeviceUpdate::Status(data.clone()));
        }
        ServerFrame::Diag { id, data } => {
            selection.forward(id, DeviceUpdate::Diag(data.clone()));
        }
        ServerFrame::Topics { id, data } => {
            selection.forward(id, DeviceUpdate::Topics(data.clone()));
        }
        ServerFrame::Values { id, data } => {
            selection.forward(id, DeviceUpdate::Values(data.clone()));
        }
        ServerFrame::Value { id, data } => {
            selection.forward(id, DeviceUpdate::Value(data.clone()));
        }
        ServerFrame::Unknown { kind, id, .. } => {
            tracing::debug!(kind, ?id, "unknown frame type, dropping");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use htfleet_api::DeviceRecord;
    use serde_json::json;

    fn record(id: &str) -> DeviceRecord {
        serde_json::from_value(json!({"id": id})).unwrap()
    }

    fn setup() -> (DeviceDirectory, SelectionChannel) {
        (DeviceDirectory::new(), SelectionChannel::new())
    }

    #[test]
    fn init_replaces_directory() {
        let (dir, sel) = setup();
        dir.replace_all(vec![record("stale")]);

        dispatch(&ServerFrame::Init(vec![record("a"), record("b")]), &dir, &sel);

        let snap = dir.snapshot();
        assert_eq!(snap.len(), 2);
        assert!(dir.get("stale").is_none());
    }

    #[test]
    fn init_refreshes_selected_device_info() {
        let (dir, sel) = setup();
        let mut rx = sel.select("b");

        dispatch(&ServerFrame::Init(vec![record("a"), record("b")]), &dir, &sel);

        let update = rx.try_recv().unwrap();
        let DeviceUpdate::Info(rec) = &*update else {
            panic!("expected Info, got {update:?}");
        };
        assert_eq!(rec.id, "b");
    }

    #[test]
    fn init_without_selected_device_publishes_no_info() {
        let (dir, sel) = setup();
        let mut rx = sel.select("ghost");

        dispatch(&ServerFrame::Init(vec![record("a")]), &dir, &sel);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn info_updates_directory_and_selection() {
        let (dir, sel) = setup();
        dir.replace_all(vec![record("a"), record("b")]);
        let mut rx = sel.select("b");

        let mut updated = record("b");
        updated.version = "2.0".into();
        dispatch(
            &ServerFrame::Info {
                id: "b".into(),
                record: updated,
            },
            &dir,
            &sel,
        );

        assert_eq!(dir.get("b").unwrap().version, "2.0");
        let update = rx.try_recv().unwrap();
        assert!(matches!(&*update, DeviceUpdate::Info(r) if r.version == "2.0"));
    }

    #[test]
    fn info_for_unselected_device_skips_selection() {
        let (dir, sel) = setup();
        let mut rx = sel.select("other");

        dispatch(
            &ServerFrame::Info {
                id: "a".into(),
                record: record("a"),
            },
            &dir,
            &sel,
        );

        assert!(dir.get("a").is_some());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn telemetry_only_reaches_matching_selection() {
        let (dir, sel) = setup();
        let mut rx = sel.select("d1");

        dispatch(
            &ServerFrame::Value {
                id: "d2".into(),
                data: json!({"relay": "on"}),
            },
            &dir,
            &sel,
        );
        dispatch(
            &ServerFrame::Value {
                id: "d1".into(),
                data: json!({"relay": "off"}),
            },
            &dir,
            &sel,
        );

        let update = rx.try_recv().unwrap();
        assert_eq!(*update, DeviceUpdate::Value(json!({"relay": "off"})));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn telemetry_without_selection_is_dropped() {
        let (dir, sel) = setup();

        // Must not panic or touch the directory.
        dispatch(
            &ServerFrame::Status {
                id: "d1".into(),
                data: json!("ok"),
            },
            &dir,
            &sel,
        );

        assert!(dir.is_empty());
    }

    #[test]
    fn removed_is_idempotent() {
        let (dir, sel) = setup();
        dir.replace_all(vec![record("a")]);

        dispatch(&ServerFrame::Removed { id: "a".into() }, &dir, &sel);
        dispatch(&ServerFrame::Removed { id: "a".into() }, &dir, &sel);

        assert!(dir.is_empty());
    }

    #[test]
    fn unknown_frame_is_ignored() {
        let (dir, sel) = setup();

        dispatch(
            &ServerFrame::Unknown {
                kind: "fleetWeather".into(),
                id: None,
                data: json!({}),
            },
            &dir,
            &sel,
        );

        assert!(dir.is_empty());
    }
}
