//! State machines for report pages and email delivery

use serde::{Deserialize, Serialize};

/// Page lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageState {
    /// Preamble written, accepting reports
    Open,

    /// Closing markup written, output ended
    Closed,
}

/// Email delivery lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Deployment still running
    Pending,

    /// Deployment finished and page closed
    ReadyToSend,

    /// Mail handed to the transport
    Sent,

    /// Transport refused or failed
    SendFailed,
}

/// Delivery event
#[derive(Debug, Clone)]
pub enum DeliveryEvent {
    /// The deployment completed and the page was closed
    Finish,

    /// Transport accepted the message
    SendSuccess,

    /// Transport failed
    SendFailed(String),
}

/// Email delivery FSM
#[derive(Debug, Clone)]
pub struct DeliveryFsm {
    state: DeliveryState,
    error: Option<String>,
}

impl DeliveryFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self {
            state: DeliveryState::Pending,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> DeliveryState {
        self.state
    }

    /// Get the transport error, if sending failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeliveryEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (DeliveryState::Pending, DeliveryEvent::Finish) => DeliveryState::ReadyToSend,
            (DeliveryState::ReadyToSend, DeliveryEvent::SendSuccess) => DeliveryState::Sent,
            (DeliveryState::ReadyToSend, DeliveryEvent::SendFailed(err)) => {
                self.error = Some(err.clone());
                DeliveryState::SendFailed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }

    /// Whether the message has already been handed off or refused
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, DeliveryState::Sent | DeliveryState::SendFailed)
    }
}

impl Default for DeliveryFsm {
    fn default() -> Self {
        Self::new()
    }
}
