//! Data types for sensor node state.
//!
//! This module contains the data structures shared across the library:
//! - Readings decoded from device replies
//! - Connection, automatic mode and lamp state
//! - State snapshots

pub mod reading;
pub mod state;

pub use reading::{Reading, ReadingKind, Readings};
pub use state::{AutomaticMode, Connection, LampState, Snapshot};
