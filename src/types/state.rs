//! Connection and mode state types.

use crate::protocol::Query;
use crate::types::reading::Readings;

/// Connection state of the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Connection {
    #[default]
    Disconnected,
    Connected,
}

impl Connection {
    /// Returns true if connected.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Whether the node drives the relay from its own sensors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AutomaticMode {
    #[default]
    On,
    Off,
}

impl AutomaticMode {
    /// Returns true if automatic mode is on.
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl From<bool> for AutomaticMode {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

/// Lamp (relay) state as commanded by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LampState {
    On,
    #[default]
    Off,
}

impl LampState {
    /// Returns true if the lamp is on.
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl From<bool> for LampState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

/// Immutable view of the client state, published after every change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Connection state.
    pub connection: Connection,
    /// Automatic mode.
    pub automatic: AutomaticMode,
    /// Lamp state.
    pub lamp: LampState,
    /// Query awaiting its answer.
    pub pending: Option<Query>,
    /// Latest readings.
    pub readings: Readings,
}
