//! Protocol definitions for sensor node communication.
//!
//! This module contains the text protocol:
//! - Query and command strings
//! - Reply classification and interpretation

pub mod command;
pub mod reply;

pub use command::{Command, Query};
pub use reply::{GAS_LEAK, GAS_OK, Interpretation, Reply, interpret};
