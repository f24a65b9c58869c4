//! Protocol error types

/// Error decoding an inbound frame
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame is not a JSON envelope with an `event` name
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),
    /// Envelope names an event the relay does not handle
    #[error("Unknown event: {0}")]
    UnknownEvent(String),
    /// A payload field has the wrong type
    #[error("Invalid payload for {event}: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
    /// Outbound message could not be serialized
    #[error("Failed to encode {event}: {source}")]
    Encode {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
