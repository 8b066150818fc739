//! Reply interpretation.
//!
//! Replies carry no tag linking them to a query. A numeric reply is
//! attributed to the single query currently pending, so correctness relies
//! on the node answering each query once and in order.

use crate::protocol::Query;
use crate::types::Reading;

/// Unsolicited status message sent when gas is detected.
pub const GAS_LEAK: &str = "Vazando gas!";

/// Unsolicited status message sent when gas levels return to normal.
pub const GAS_OK: &str = "Gas ok!";

/// Syntactic classification of a raw reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Gas status message (`true` = leak).
    GasStatus(bool),
    /// Decimal integer.
    Number(i32),
    /// Anything else.
    Text,
}

impl Reply {
    /// Classifies a raw message. Surrounding whitespace is ignored.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        if text == GAS_LEAK {
            Self::GasStatus(true)
        } else if text == GAS_OK {
            Self::GasStatus(false)
        } else if let Ok(value) = text.parse::<i32>() {
            Self::Number(value)
        } else {
            Self::Text
        }
    }
}

/// Outcome of interpreting a reply against the pending query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpretation {
    /// Gas status update, independent of any pending query.
    GasStatus(bool),
    /// Valid answer to the pending query.
    Reading(Reading),
    /// Numeric answer outside the pending query's valid range.
    OutOfRange { query: Query, value: i32 },
    /// Numeric reply with no query pending.
    Unsolicited(i32),
    /// Not a recognized reply.
    Unrecognized,
}

impl Interpretation {
    /// Returns true if this interpretation answers the pending query.
    ///
    /// Out-of-range answers count: the query was answered, just not usefully.
    #[must_use]
    pub const fn consumes_pending(&self) -> bool {
        matches!(self, Self::Reading(_) | Self::OutOfRange { .. })
    }
}

/// Interprets `raw` given the query most recently sent.
#[must_use]
pub fn interpret(raw: &str, pending: Option<Query>) -> Interpretation {
    match Reply::parse(raw) {
        Reply::GasStatus(alarm) => Interpretation::GasStatus(alarm),
        Reply::Number(value) => match pending {
            Some(query) => match Reading::decode(query, value) {
                Some(reading) => Interpretation::Reading(reading),
                None => Interpretation::OutOfRange { query, value },
            },
            None => Interpretation::Unsolicited(value),
        },
        Reply::Text => Interpretation::Unrecognized,
    }
}
