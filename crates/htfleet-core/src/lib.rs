//! Client-side synchronization engine for a homething device fleet.
//!
//! Maintains a live, ordered mirror of the fleet manager's device
//! directory over a push WebSocket link, and routes per-device telemetry
//! to whoever is watching the selected device.
//!
//! The main entry point is [`DeviceManager`]:
//!
//! ```rust,ignore
//! use htfleet_core::{DeviceManager, ManagerConfig};
//! use url::Url;
//!
//! let config = ManagerConfig::new(Url::parse("http://fleet.local:8080")?);
//! let manager = DeviceManager::connect(config)?;
//!
//! // Ordered directory snapshot, kept current by push updates.
//! let mut directory = manager.devices();
//! while let Some(snapshot) = directory.changed().await {
//!     println!("{} devices", snapshot.len());
//! }
//! ```
//!
//! Internally the engine is layered:
//!
//! - [`directory`]: the ordered, reactive device directory (full
//!   snapshots on `init`, in-place patches for `lastSeen`/`info`,
//!   idempotent removal).
//! - [`selection`]: the single-device telemetry channel: at most one
//!   device is selected at a time, and its updates fan out to any number
//!   of subscribers.
//! - [`dispatch`]: the routing table from inbound frames to the two
//!   sinks above.
//! - [`engine`]: lifecycle. Owns the WebSocket link, replays the
//!   subscription after reconnects, and exposes the public API.

pub mod config;
pub mod directory;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod pending;
pub mod selection;
pub mod stream;

pub use config::ManagerConfig;
pub use engine::DeviceManager;
pub use error::CoreError;
pub use selection::DeviceUpdate;
pub use stream::{DeviceStream, DirectoryStream};

// Re-export the wire types consumers interact with directly.
pub use htfleet_api::{DeviceDiag, DeviceRecord, LinkState, ReconnectConfig};
