//! Transport layer for sensor node communication.
//!
//! This module provides the abstraction over the message channel to the
//! node. Currently only WebSocket is implemented.

pub mod websocket;

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::error::Result;

/// Messages produced by a transport's receive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// One decoded text message.
    Message(String),
    /// The connection ended. Sent once, as the last item.
    Closed { reason: String },
}

/// Trait for transport implementations.
///
/// A transport owns its receive loop: after a successful `connect` it
/// forwards every incoming message to `inbound` until the connection ends.
pub trait Transport: Send + Sync {
    /// Connects to the device at `url`.
    fn connect(
        &mut self,
        url: String,
        inbound: mpsc::Sender<Inbound>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Disconnects from the device and stops the receive loop.
    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Sends one text message to the device.
    fn send(&mut self, text: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

pub use websocket::WebSocketTransport;
