//! Wire protocol and transport layer for the homething fleet manager.
//!
//! This crate owns everything that touches the network:
//!
//! - **[`frame`]**: typed WebSocket frames. [`ServerFrame`] for inbound
//!   push updates (device directory snapshots, patches, per-device
//!   telemetry) and [`ClientCommand`] for the two outbound subscription
//!   commands. Frames are parsed and validated at the boundary; unknown
//!   frame types land in [`ServerFrame::Unknown`] instead of failing.
//!
//! - **[`websocket`]**: the persistent `/api/ws` connection with
//!   automatic reconnection (capped exponential backoff + jitter).
//!   [`WebSocketHandle`] fans parsed frames out through a broadcast
//!   channel and accepts outbound commands through an mpsc queue.
//!
//! - **[`rest`]**: one-shot HTTP actions against `/api/devices/...`:
//!   directory snapshot, info, diagnostics, profile read/write, firmware
//!   version listing, reboot/update commands, and deletion.
//!
//! `htfleet-core` builds the stateful synchronization engine on top of
//! these primitives.

pub mod error;
pub mod frame;
pub mod model;
pub mod rest;
pub mod transport;
pub mod websocket;

pub use error::Error;
pub use frame::{ClientCommand, ServerFrame};
pub use model::{DeviceDiag, DeviceRecord};
pub use rest::RestClient;
pub use websocket::{LinkState, ReconnectConfig, WebSocketHandle};
