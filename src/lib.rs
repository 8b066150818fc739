//! # sensorlink
//!
//! A Rust client library for WebSocket gas/presence sensor nodes.
//!
//! The node reports gas leaks, temperature, humidity and motion presence and
//! drives one relay (a lamp). It speaks a bare text protocol: one query per
//! message, one untagged integer per reply, plus unsolicited gas status
//! messages.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Round-robin polling with a single outstanding query
//! - Range-validated, typed readings
//! - Event-driven architecture for the presentation layer
//! - Mode/lamp commands gated by session state, with observable rejections
//!
//! ## Quick Start
//!
//! ```no_run
//! use sensorlink::{Event, SensorLink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sensorlink::Error> {
//!     let client = SensorLink::websocket("ws://192.168.0.157:81");
//!     let mut events = client.subscribe();
//!
//!     // Connecting forces automatic mode on and the lamp off
//!     client.connect().await?;
//!
//!     // Take manual control of the lamp
//!     client.set_automatic(false).await?;
//!     client.set_lamp(true).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let Event::ReadingUpdated(reading) = event {
//!             println!("{reading:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Query/command strings and reply interpretation
//! - [`types`] - Readings, connection/mode state and snapshots
//! - [`transport`] - Transport implementations (currently WebSocket)
//! - [`poll`] - Round-robin poll cursor
//! - [`session`] - Connection/mode state and command gating
//! - [`event`] - Async event system for the presentation layer
//! - [`commands`] - Command dispatch over the transport
//! - [`client`] - High-level [`SensorLink`] client

pub mod client;
pub mod commands;
pub mod error;
pub mod event;
pub mod poll;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{ClientConfig, SensorLink};
pub use error::{Error, Rejection, Result};
pub use event::{Direction, Event, EventDispatcher, EventFilter, EventKind, Subscription};
pub use protocol::{Command, Query};
pub use session::ModeRequest;
pub use transport::{Inbound, Transport, WebSocketTransport, websocket::WebSocketConfig};
pub use types::{
    AutomaticMode, Connection, LampState, Reading, ReadingKind, Readings, Snapshot,
};
