//! Round-robin poll cycle.
//!
//! One query is issued per tick, in the fixed order of
//! [`Query::ROUND_ROBIN`]. The query just issued stays pending until a
//! numeric reply consumes it or the next tick replaces it.

use crate::protocol::Query;
use crate::types::Connection;

/// Poll cursor and pending query.
#[derive(Debug, Clone, Default)]
pub struct Poller {
    cursor: usize,
    pending: Option<Query>,
}

impl Poller {
    /// Creates a poller positioned at the first query.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cursor: 0,
            pending: None,
        }
    }

    /// Advances one step.
    ///
    /// Returns the query to send, or `None` while disconnected. The cursor
    /// does not move while disconnected.
    pub fn tick(&mut self, connection: Connection) -> Option<Query> {
        if !connection.is_connected() {
            return None;
        }

        let query = Query::ROUND_ROBIN[self.cursor];
        self.cursor = (self.cursor + 1) % Query::ROUND_ROBIN.len();
        self.pending = Some(query);
        Some(query)
    }

    /// Returns the query the next tick will send.
    #[must_use]
    pub const fn next_query(&self) -> Query {
        Query::ROUND_ROBIN[self.cursor]
    }

    /// Returns the query awaiting a reply.
    #[must_use]
    pub const fn pending(&self) -> Option<Query> {
        self.pending
    }

    /// Takes the pending query, leaving none.
    pub fn take_pending(&mut self) -> Option<Query> {
        self.pending.take()
    }

    /// Forgets the pending query.
    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    /// Moves the cursor back to the first query and clears the pending one.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.pending = None;
    }
}
