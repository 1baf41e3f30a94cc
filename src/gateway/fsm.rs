use crate::{Error, Result};
use tracing::{debug, info, warn};

// Connection states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

// Connection events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    PeerClosed,
    ReadFailed,
    Shutdown,
    Released,
}

pub struct ConnectionStateMachine {
    state: ConnectionState,
    connection_id: String,
}

impl ConnectionStateMachine {
    pub fn new(connection_id: impl Into<String>) -> Self {
        let connection_id = connection_id.into();
        debug!(connection_id = %connection_id, "Connection state machine created");
        Self {
            state: ConnectionState::Open,
            connection_id,
        }
    }

    pub fn current_state(&self) -> ConnectionState {
        self.state
    }

    pub fn transition(&mut self, event: ConnectionEvent) -> Result<ConnectionState> {
        let old_state = self.state;

        let new_state = match (old_state, event) {
            (
                ConnectionState::Open,
                ConnectionEvent::PeerClosed | ConnectionEvent::ReadFailed | ConnectionEvent::Shutdown,
            ) => ConnectionState::Closing,
            (ConnectionState::Closing, ConnectionEvent::Released) => ConnectionState::Closed,
            _ => {
                warn!(
                    connection_id = %self.connection_id,
                    "Invalid connection transition from {:?} with event {:?}",
                    old_state, event
                );
                return Err(Error::InvalidTransition {
                    current: format!("{old_state:?}"),
                    requested: format!("{event:?}"),
                });
            }
        };

        info!(
            connection_id = %self.connection_id,
            "Connection state transition: {:?} -> {:?} (event: {:?})",
            old_state, new_state, event
        );

        self.state = new_state;
        Ok(new_state)
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    #[cfg(test)]
    fn is_terminal(&self) -> bool {
        self.state == ConnectionState::Closed
    }
}
