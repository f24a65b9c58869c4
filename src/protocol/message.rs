//! Outbound messages
//!
//! Outbound frames share the inbound envelope shape and are addressed either
//! to the caller, to a room, or to a field client's own connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ProtocolError;
use crate::incident::AlertType;
use crate::registry::{ClientIdentity, OutboundFrame};

/// Message sent to one or more connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Request rejected
    Error { message: String },
    /// Field registration accepted
    Registered { user_id: ClientIdentity },
    /// Forwarded audio chunk
    AudioChunk { user_id: ClientIdentity, chunk: Value },
    /// Forwarded location update
    LocationUpdate {
        user_id: ClientIdentity,
        lat: f64,
        lon: f64,
    },
    /// Subscription confirmed; `room` is the followed identity
    ListenConfirm { room: ClientIdentity },
    /// Subscription removed
    ListenStopped { room: ClientIdentity },
    /// Outcome of recording an incident
    IncidentAck {
        user_id: ClientIdentity,
        alert_type: AlertType,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl OutboundMessage {
    /// Build an error message
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Wire name of the message
    pub fn name(&self) -> &'static str {
        match self {
            Self::Error { .. } => "error",
            Self::Registered { .. } => "registered",
            Self::AudioChunk { .. } => "audio_chunk",
            Self::LocationUpdate { .. } => "location_update",
            Self::ListenConfirm { .. } => "listen_confirm",
            Self::ListenStopped { .. } => "listen_stopped",
            Self::IncidentAck { .. } => "incident_ack",
        }
    }

    /// Serialize once for fan-out
    pub fn encode(&self) -> Result<OutboundFrame, ProtocolError> {
        serde_json::to_string(self)
            .map(OutboundFrame::from)
            .map_err(|source| ProtocolError::Encode {
                event: self.name(),
                source,
            })
    }

    /// Decode a frame produced by [`encode`](Self::encode)
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::InvalidEnvelope)
    }
}

/// Recipient set of an outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The connection the triggering event came from
    Caller,
    /// Every monitor currently in the room for this identity
    Room(ClientIdentity),
    /// The connection registered for this field identity
    Field(ClientIdentity),
}

/// An outbound message together with its recipients
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub target: Target,
    pub message: OutboundMessage,
}

impl Delivery {
    /// Address `message` to the caller
    pub fn caller(message: OutboundMessage) -> Self {
        Self {
            target: Target::Caller,
            message,
        }
    }

    /// Address `message` to a room
    pub fn room(room: ClientIdentity, message: OutboundMessage) -> Self {
        Self {
            target: Target::Room(room),
            message,
        }
    }
}
