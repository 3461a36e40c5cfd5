// ── Device wire types ──
//
// Record shapes exactly as the server sends them. Field names follow the
// wire (camelCase / snake_case mix is the server's, not ours), and every
// record keeps unrecognized fields in `extra` so nothing the server adds
// later is silently dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A device summary record: one entry in the fleet directory.
///
/// Identity key is [`id`](Self::id). All other fields default when absent
/// so partially-populated records (fresh devices that have not reported
/// everything yet) still parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Firmware version currently running on the device.
    #[serde(default)]
    pub version: String,

    #[serde(rename = "deviceType", default)]
    pub device_type: String,

    #[serde(default)]
    pub ip_addr: String,

    /// Flash size in bytes.
    #[serde(default)]
    pub memory: u64,

    #[serde(default)]
    pub capabilities: Vec<String>,

    /// When the device last reported in. `None` until first contact.
    #[serde(rename = "lastSeen", default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,

    /// All remaining server-defined fields, passed through opaquely.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DeviceRecord {
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}

/// Per-device diagnostics as returned by `GET /api/devices/{id}/diag`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDiag {
    #[serde(rename = "lastSeen", default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,

    /// Seconds since the device booted.
    #[serde(default)]
    pub uptime: u64,

    #[serde(default)]
    pub mem: DiagMemInfo,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<DiagTaskInfo>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Heap statistics reported in diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagMemInfo {
    /// Bytes currently free.
    #[serde(default)]
    pub free: u64,
    /// Low-water mark of free bytes since boot.
    #[serde(default)]
    pub low: u64,
}

/// Per-task stack headroom reported in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagTaskInfo {
    pub name: String,
    #[serde(rename = "stackMinLeft", default)]
    pub stack_min_left: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn record_parses_with_extra_fields_preserved() {
        let json = r#"{
            "id": "a1b2c3",
            "description": "Kitchen sensor",
            "version": "1.4.2",
            "deviceType": "esp8266",
            "ip_addr": "192.168.1.40",
            "memory": 4194304,
            "capabilities": ["flash1MB", "ota"],
            "lastSeen": "2024-01-01T00:00:00Z",
            "rssi": -67
        }"#;

        let record: DeviceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "a1b2c3");
        assert_eq!(record.device_type, "esp8266");
        assert!(record.has_capability("flash1MB"));
        assert!(!record.has_capability("ble"));
        assert!(record.last_seen.is_some());
        // Server-defined fields we don't model stay available.
        assert_eq!(record.extra["rssi"], -67);
    }

    #[test]
    fn record_parses_with_minimal_fields() {
        let record: DeviceRecord = serde_json::from_str(r#"{"id": "x"}"#).unwrap();
        assert_eq!(record.id, "x");
        assert!(record.description.is_empty());
        assert!(record.capabilities.is_empty());
        assert!(record.last_seen.is_none());
    }

    #[test]
    fn record_round_trips_extra_fields() {
        let json = r#"{"id":"d1","rssi":-40}"#;
        let record: DeviceRecord = serde_json::from_str(json).unwrap();
        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["rssi"], -40);
        assert_eq!(out["id"], "d1");
    }

    #[test]
    fn diag_parses() {
        let json = r#"{
            "lastSeen": "2024-01-01T00:00:00Z",
            "uptime": 3600,
            "mem": { "free": 21000, "low": 18000 },
            "tasks": [{ "name": "main", "stackMinLeft": 512 }]
        }"#;

        let diag: DeviceDiag = serde_json::from_str(json).unwrap();
        assert_eq!(diag.uptime, 3600);
        assert_eq!(diag.mem.free, 21000);
        assert_eq!(diag.tasks[0].name, "main");
        assert_eq!(diag.tasks[0].stack_min_left, 512);
    }
}
