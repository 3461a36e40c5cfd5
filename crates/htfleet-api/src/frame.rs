// ── WebSocket frame types ──
//
// Every message on the wire has the envelope `{type, id?, data}` inbound
// and `{cmd, id}` outbound. Inbound frames are classified into a tagged
// union here, at the boundary: a frame either parses into a known variant
// with a validated payload, or lands in `Unknown` carrying the raw data.
// Structural failures (missing `id`, wrong payload shape) are errors the
// transport logs and drops; they never reach the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;
use crate::model::DeviceRecord;

/// An outbound command to the server.
///
/// Serializes to `{"cmd": "selectDevice", "id": "..."}` /
/// `{"cmd": "unselectDevice", "id": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum ClientCommand {
    SelectDevice { id: String },
    UnselectDevice { id: String },
}

impl ClientCommand {
    /// The device id this command targets.
    pub fn id(&self) -> &str {
        match self {
            Self::SelectDevice { id } | Self::UnselectDevice { id } => id,
        }
    }
}

/// An inbound push frame from the server, classified by its `type` field.
///
/// Directory frames (`Init`, `LastSeen`, `Info`, `Removed`) mutate the
/// fleet view; telemetry frames (`Status`, `Diag`, `Topics`, `Values`,
/// `Value`) are only meaningful for the currently selected device and
/// carry their payload opaquely. `Unknown` preserves forward
/// compatibility: new server frame types parse, get logged, and are
/// dropped without disturbing the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// Full directory snapshot, in server order.
    Init(Vec<DeviceRecord>),
    /// Patch the `lastSeen` field of one record.
    LastSeen {
        id: String,
        last_seen: Option<DateTime<Utc>>,
    },
    /// Full record replacement (upsert).
    Info { id: String, record: DeviceRecord },
    /// Device removed from the fleet.
    Removed { id: String },
    /// Free-form status text for the selected device.
    Status { id: String, data: Value },
    /// Diagnostics for the selected device.
    Diag { id: String, data: Value },
    /// Topic tree for the selected device.
    Topics { id: String, data: Value },
    /// Bulk topic values for the selected device.
    Values { id: String, data: Value },
    /// A single topic value update for the selected device.
    Value { id: String, data: Value },
    /// Anything we don't recognize, kept raw.
    Unknown {
        kind: String,
        id: Option<String>,
        data: Value,
    },
}

/// Raw inbound envelope before classification.
#[derive(Debug, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Payload of a `lastSeen` patch frame.
#[derive(Debug, Deserialize)]
struct LastSeenPatch {
    #[serde(rename = "lastSeen", default)]
    last_seen: Option<DateTime<Utc>>,
}

impl ServerFrame {
    /// Parse one text frame off the wire.
    ///
    /// Known frame types are validated structurally (required `id`,
    /// payload shape); anything else becomes [`ServerFrame::Unknown`].
    pub fn parse(text: &str) -> Result<Self, Error> {
        let envelope: WireEnvelope = serde_json::from_str(text)
            .map_err(|e| Error::MalformedFrame(format!("invalid envelope: {e}")))?;

        let frame = match envelope.kind.as_str() {
            "init" => {
                let records: Vec<DeviceRecord> = serde_json::from_value(envelope.data)
                    .map_err(|e| Error::MalformedFrame(format!("init payload: {e}")))?;
                Self::Init(records)
            }
            "lastSeen" => {
                let id = require_id("lastSeen", envelope.id)?;
                let patch: LastSeenPatch = serde_json::from_value(envelope.data)
                    .map_err(|e| Error::MalformedFrame(format!("lastSeen payload: {e}")))?;
                Self::LastSeen {
                    id,
                    last_seen: patch.last_seen,
                }
            }
            "info" => {
                let id = require_id("info", envelope.id)?;
                let record: DeviceRecord = serde_json::from_value(envelope.data)
                    .map_err(|e| Error::MalformedFrame(format!("info payload: {e}")))?;
                Self::Info { id, record }
            }
            "removed" => {
                let id = require_id("removed", envelope.id)?;
                Self::Removed { id }
            }
            "status" => Self::Status {
                id: require_id("status", envelope.id)?,
                data: envelope.data,
            },
            "diag" => Self::Diag {
                id: require_id("diag", envelope.id)?,
                data: envelope.data,
            },
            "topics" => Self::Topics {
                id: require_id("topics", envelope.id)?,
                data: envelope.data,
            },
            "values" => Self::Values {
                id: require_id("values", envelope.id)?,
                data: envelope.data,
            },
            "value" => Self::Value {
                id: require_id("value", envelope.id)?,
                data: envelope.data,
            },
            _ => Self::Unknown {
                kind: envelope.kind,
                id: envelope.id,
                data: envelope.data,
            },
        };

        Ok(frame)
    }

    /// The frame's `type` discriminant as it appeared on the wire.
    pub fn kind(&self) -> &str {
        match self {
            Self::Init(_) => "init",
            Self::LastSeen { .. } => "lastSeen",
            Self::Info { .. } => "info",
            Self::Removed { .. } => "removed",
            Self::Status { .. } => "status",
            Self::Diag { .. } => "diag",
            Self::Topics { .. } => "topics",
            Self::Values { .. } => "values",
            Self::Value { .. } => "value",
            Self::Unknown { kind, .. } => kind,
        }
    }
}

fn require_id(kind: &str, id: Option<String>) -> Result<String, Error> {
    id.ok_or_else(|| Error::MalformedFrame(format!("{kind} frame missing id")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn serialize_select_command() {
        let cmd = ClientCommand::SelectDevice { id: "d1".into() };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json, serde_json::json!({"cmd": "selectDevice", "id": "d1"}));
    }

    #[test]
    fn serialize_unselect_command() {
        let cmd = ClientCommand::UnselectDevice { id: "d1".into() };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"cmd": "unselectDevice", "id": "d1"})
        );
    }

    #[test]
    fn parse_init_frame() {
        let text = r#"{
            "type": "init",
            "data": [
                {"id": "d1", "description": "one"},
                {"id": "d2", "description": "two"}
            ]
        }"#;

        let frame = ServerFrame::parse(text).unwrap();
        let ServerFrame::Init(records) = frame else {
            panic!("expected Init, got {frame:?}");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "d1");
        assert_eq!(records[1].id, "d2");
    }

    #[test]
    fn parse_last_seen_frame() {
        let text = r#"{
            "type": "lastSeen",
            "id": "d1",
            "data": {"lastSeen": "2024-01-01T00:00:00Z"}
        }"#;

        let frame = ServerFrame::parse(text).unwrap();
        let ServerFrame::LastSeen { id, last_seen } = frame else {
            panic!("expected LastSeen");
        };
        assert_eq!(id, "d1");
        assert!(last_seen.is_some());
    }

    #[test]
    fn parse_last_seen_null() {
        let text = r#"{"type": "lastSeen", "id": "d1", "data": {"lastSeen": null}}"#;
        let frame = ServerFrame::parse(text).unwrap();
        assert_eq!(
            frame,
            ServerFrame::LastSeen {
                id: "d1".into(),
                last_seen: None
            }
        );
    }

    #[test]
    fn parse_info_frame() {
        let text = r#"{
            "type": "info",
            "id": "d1",
            "data": {"id": "d1", "description": "new", "version": "2.0"}
        }"#;

        let frame = ServerFrame::parse(text).unwrap();
        let ServerFrame::Info { id, record } = frame else {
            panic!("expected Info");
        };
        assert_eq!(id, "d1");
        assert_eq!(record.description, "new");
    }

    #[test]
    fn parse_telemetry_frames_keep_raw_payload() {
        for kind in ["status", "diag", "topics", "values", "value"] {
            let text = format!(r#"{{"type": "{kind}", "id": "d1", "data": {{"k": 1}}}}"#);
            let frame = ServerFrame::parse(&text).unwrap();
            assert_eq!(frame.kind(), kind);
        }
    }

    #[test]
    fn parse_unknown_frame_type() {
        let text = r#"{"type": "fleetWeather", "id": "d1", "data": {"sunny": true}}"#;
        let frame = ServerFrame::parse(text).unwrap();
        let ServerFrame::Unknown { kind, id, data } = frame else {
            panic!("expected Unknown");
        };
        assert_eq!(kind, "fleetWeather");
        assert_eq!(id.as_deref(), Some("d1"));
        assert_eq!(data["sunny"], true);
    }

    #[test]
    fn parse_rejects_missing_id() {
        let err = ServerFrame::parse(r#"{"type": "removed"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
    }

    #[test]
    fn parse_rejects_non_json() {
        let err = ServerFrame::parse("not json at all").unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
    }

    #[test]
    fn parse_rejects_wrong_payload_shape() {
        // init wants an array of records, not an object
        let err = ServerFrame::parse(r#"{"type": "init", "data": {"id": "d1"}}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
    }
}
