//! Command dispatch for sensor node operations.
//!
//! Commands are fire-and-forget: a command counts as done once the transport
//! accepted it, the node sends no acknowledgment.

use crate::error::Result;
use crate::event::{Direction, Event, EventDispatcher};
use crate::protocol::{Command, Query};
use crate::session::{ModeRequest, Session};
use crate::transport::Transport;

/// Sends commands and poll queries through a transport.
pub struct CommandDispatcher<T> {
    transport: T,
    dispatcher: EventDispatcher,
}

impl<T: Transport> CommandDispatcher<T> {
    /// Creates a new command dispatcher.
    #[must_use]
    pub const fn new(transport: T, dispatcher: EventDispatcher) -> Self {
        Self {
            transport,
            dispatcher,
        }
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the transport mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Sends a single command without waiting for a reply.
    pub async fn send(&mut self, command: Command) -> Result<()> {
        tracing::debug!("sending command {}", command);
        self.transport.send(command.as_str().to_owned()).await
    }

    /// Sends a poll query and logs it as sent traffic.
    pub async fn send_query(&mut self, query: Query) -> Result<()> {
        self.send(Command::Query(query)).await?;
        self.dispatcher.dispatch(Event::RawLog {
            text: query.as_str().to_owned(),
            direction: Direction::Sent,
        });
        Ok(())
    }

    /// Executes a mode request against the session.
    ///
    /// Sends the request's commands in order and commits the state change
    /// only if all of them went out. Rejected requests send nothing.
    pub async fn execute(&mut self, session: &mut Session, request: ModeRequest) -> Result<()> {
        let commands = session.plan(request).inspect_err(|rejection| {
            tracing::debug!("{:?} rejected: {}", request, rejection);
        })?;

        for &command in commands {
            self.send(command).await?;
        }

        session.commit(request);
        Ok(())
    }
}
