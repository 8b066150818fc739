//! Command strings for the sensor node protocol.
//!
//! Every command is a single text message. Queries ask the node for one
//! sensor value and are answered with a bare decimal integer; mode and relay
//! commands are not answered.

use std::fmt;

/// Sensor queries polled in round-robin order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    /// Temperature in °C.
    Temperature,
    /// Relative humidity in %.
    Humidity,
    /// PIR motion presence (0 or 1).
    Presence,
    /// Relay output state (0 or 1).
    RelayStatus,
}

impl Query {
    /// Polling order. The cursor wraps after the last entry.
    pub const ROUND_ROBIN: [Self; 4] = [
        Self::Temperature,
        Self::Humidity,
        Self::Presence,
        Self::RelayStatus,
    ];

    /// Returns the wire string for this query.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "TEMPERATURA",
            Self::Humidity => "UMIDADE",
            Self::Presence => "PIR",
            Self::RelayStatus => "RELE",
        }
    }

    /// Inclusive range of valid answers to this query.
    #[must_use]
    pub const fn valid_range(self) -> (i32, i32) {
        match self {
            Self::Temperature => (0, 50),
            Self::Humidity => (0, 100),
            Self::Presence | Self::RelayStatus => (0, 1),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands sent to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Request a sensor value.
    Query(Query),
    /// Switch the relay (lamp) on.
    RelayOn,
    /// Switch the relay (lamp) off.
    RelayOff,
    /// Let the node drive the relay from its own sensors.
    AutomaticOn,
    /// Hand relay control to the client.
    AutomaticOff,
}

impl Command {
    /// Returns the wire string for this command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query(query) => query.as_str(),
            Self::RelayOn => "RELE_on",
            Self::RelayOff => "RELE_off",
            Self::AutomaticOn => "AUTOMATICO_on",
            Self::AutomaticOff => "AUTOMATICO_off",
        }
    }
}

impl From<Query> for Command {
    fn from(query: Query) -> Self {
        Self::Query(query)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
