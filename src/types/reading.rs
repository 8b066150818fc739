//! Sensor reading types.

use crate::protocol::Query;

/// Kind of value reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingKind {
    /// Gas leak alarm (unsolicited status message).
    GasAlarm,
    /// Temperature in °C.
    Temperature,
    /// Relative humidity in %.
    Humidity,
    /// Motion presence.
    Presence,
    /// Relay output state.
    RelayStatus,
}

impl From<Query> for ReadingKind {
    fn from(query: Query) -> Self {
        match query {
            Query::Temperature => Self::Temperature,
            Query::Humidity => Self::Humidity,
            Query::Presence => Self::Presence,
            Query::RelayStatus => Self::RelayStatus,
        }
    }
}

/// A validated value decoded from a device message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    /// Gas leak detected.
    GasAlarm(bool),
    /// Temperature in °C (0-50).
    Temperature(u8),
    /// Relative humidity in % (0-100).
    Humidity(u8),
    /// Motion detected.
    Presence(bool),
    /// Relay energized.
    RelayStatus(bool),
}

impl Reading {
    /// Decodes the integer answer to `query`.
    ///
    /// Returns `None` if the value is outside the query's valid range.
    #[must_use]
    pub fn decode(query: Query, value: i32) -> Option<Self> {
        let (min, max) = query.valid_range();
        if !(min..=max).contains(&value) {
            return None;
        }
        let value = u8::try_from(value).ok()?;

        Some(match query {
            Query::Temperature => Self::Temperature(value),
            Query::Humidity => Self::Humidity(value),
            Query::Presence => Self::Presence(value == 1),
            Query::RelayStatus => Self::RelayStatus(value == 1),
        })
    }

    /// Returns the kind of this reading.
    #[must_use]
    pub const fn kind(&self) -> ReadingKind {
        match self {
            Self::GasAlarm(_) => ReadingKind::GasAlarm,
            Self::Temperature(_) => ReadingKind::Temperature,
            Self::Humidity(_) => ReadingKind::Humidity,
            Self::Presence(_) => ReadingKind::Presence,
            Self::RelayStatus(_) => ReadingKind::RelayStatus,
        }
    }
}

/// Latest accepted value of every reading.
///
/// Fields stay `None` until the node reports a valid value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readings {
    pub gas_alarm: Option<bool>,
    pub temperature: Option<u8>,
    pub humidity: Option<u8>,
    pub presence: Option<bool>,
    pub relay_status: Option<bool>,
}

impl Readings {
    /// Creates an empty set of readings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            gas_alarm: None,
            temperature: None,
            humidity: None,
            presence: None,
            relay_status: None,
        }
    }

    /// Stores a reading, replacing the previous value of its kind.
    pub fn apply(&mut self, reading: Reading) {
        match reading {
            Reading::GasAlarm(v) => self.gas_alarm = Some(v),
            Reading::Temperature(v) => self.temperature = Some(v),
            Reading::Humidity(v) => self.humidity = Some(v),
            Reading::Presence(v) => self.presence = Some(v),
            Reading::RelayStatus(v) => self.relay_status = Some(v),
        }
    }
}
