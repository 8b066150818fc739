//! Session and mode state.
//!
//! [`Session`] owns the connection flag, automatic mode, lamp state and the
//! latest readings. Requests are checked with [`Session::plan`], which returns
//! the wire commands to send, and committed with [`Session::commit`] once the
//! commands went out.

use crate::error::Rejection;
use crate::protocol::Command;
use crate::types::{AutomaticMode, Connection, LampState, Reading, Readings};

/// Commands sent when entering automatic mode (on connect as well).
const ENTER_AUTOMATIC: &[Command] = &[Command::RelayOff, Command::AutomaticOn];

/// State-changing requests from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRequest {
    /// Initialize a freshly opened connection.
    Connect,
    /// Turn automatic mode on or off.
    SetAutomatic(bool),
    /// Turn the lamp on or off (manual mode only).
    SetLamp(bool),
}

/// Connection and mode state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    connection: Connection,
    automatic: AutomaticMode,
    lamp: LampState,
    readings: Readings,
}

impl Session {
    /// Creates a disconnected session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the connection state.
    #[must_use]
    pub const fn connection(&self) -> Connection {
        self.connection
    }

    /// Returns the automatic mode.
    #[must_use]
    pub const fn automatic(&self) -> AutomaticMode {
        self.automatic
    }

    /// Returns the lamp state.
    #[must_use]
    pub const fn lamp(&self) -> LampState {
        self.lamp
    }

    /// Returns the latest readings.
    #[must_use]
    pub const fn readings(&self) -> &Readings {
        &self.readings
    }

    /// Checks a request against the current state.
    ///
    /// Returns the commands to send, in order, if the request is allowed.
    pub fn plan(&self, request: ModeRequest) -> Result<&'static [Command], Rejection> {
        match request {
            ModeRequest::Connect => {
                if self.connection.is_connected() {
                    Err(Rejection::AlreadyConnected)
                } else {
                    Ok(ENTER_AUTOMATIC)
                }
            }
            ModeRequest::SetAutomatic(on) => {
                self.require_connected()?;
                if on {
                    Ok(ENTER_AUTOMATIC)
                } else {
                    Ok(&[Command::AutomaticOff])
                }
            }
            ModeRequest::SetLamp(on) => {
                self.require_connected()?;
                if self.automatic.is_on() {
                    return Err(Rejection::AutomaticModeActive);
                }
                if on {
                    Ok(&[Command::RelayOn])
                } else {
                    Ok(&[Command::RelayOff])
                }
            }
        }
    }

    /// Applies the state change of a request whose commands were sent.
    pub fn commit(&mut self, request: ModeRequest) {
        match request {
            ModeRequest::Connect => {
                self.connection = Connection::Connected;
                self.automatic = AutomaticMode::On;
                self.lamp = LampState::Off;
            }
            ModeRequest::SetAutomatic(true) => {
                self.automatic = AutomaticMode::On;
                self.lamp = LampState::Off;
            }
            ModeRequest::SetAutomatic(false) => self.automatic = AutomaticMode::Off,
            ModeRequest::SetLamp(on) => self.lamp = LampState::from(on),
        }
    }

    /// Marks the connection as lost. Mode and readings are kept.
    pub fn disconnected(&mut self) {
        self.connection = Connection::Disconnected;
    }

    /// Records a validated reading.
    pub fn record(&mut self, reading: Reading) {
        self.readings.apply(reading);
    }

    const fn require_connected(&self) -> Result<(), Rejection> {
        if self.connection.is_connected() {
            Ok(())
        } else {
            Err(Rejection::NotConnected)
        }
    }
}
