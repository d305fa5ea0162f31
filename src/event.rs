//! The event object passed through a dispatch

use crate::error::EventError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A mutable event travelling through the listener chain.
///
/// An event owns two things: an optional JSON payload that listeners may
/// read and mutate, and the propagation-stop flag. Once a listener calls
/// [`stop_propagation`](Event::stop_propagation), no further listener runs
/// within the current dispatch; the flag never transitions back, so reusing
/// the same event across a nested dispatch carries it across the boundary.
#[derive(Debug, Clone, Default)]
pub struct Event {
    payload: Value,
    propagation_stopped: bool,
}

impl Event {
    /// Create an event without a payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an event carrying a serializable payload
    pub fn with_payload<T: Serialize>(payload: &T) -> Result<Self, EventError> {
        Ok(Self {
            payload: serde_json::to_value(payload)?,
            propagation_stopped: false,
        })
    }

    /// Create an event from an already-built JSON value
    pub fn from_value(payload: Value) -> Self {
        Self {
            payload,
            propagation_stopped: false,
        }
    }

    /// The event payload (`Value::Null` when none was given)
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Mutable access to the payload, for listeners that enrich the event
    pub fn payload_mut(&mut self) -> &mut Value {
        &mut self.payload
    }

    /// Deserialize the payload into a concrete type
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, EventError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| EventError::DeserializationFailed(e.to_string()))
    }

    /// Halt the remaining listener chain for the current dispatch
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Whether a listener has stopped propagation
    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}
