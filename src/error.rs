//! Error types for the event system

/// Errors that can occur while dispatching events
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// A listener failed during invocation
    #[error("Listener execution failed: {0}")]
    ListenerFailed(String),

    /// Event payload serialization failed
    #[error("Event payload serialization failed: {0}")]
    SerializationFailed(String),

    /// Event payload deserialization failed
    #[error("Event payload deserialization failed: {0}")]
    DeserializationFailed(String),
}

impl EventError {
    /// Shorthand for a listener failure with a message
    pub fn listener(message: impl Into<String>) -> Self {
        EventError::ListenerFailed(message.into())
    }
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::SerializationFailed(err.to_string())
    }
}
