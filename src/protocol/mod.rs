//! Wire protocol between clients and the relay
//!
//! JSON envelopes carried in WebSocket text frames:
//!
//! ```text
//! {"event": "audio_chunk", "data": {"user_id": "u1", "chunk": "..."}}
//! ```

pub mod error;
pub mod event;
pub mod message;

pub use error::ProtocolError;
pub use event::{
    AlertPayload, AudioChunkPayload, IdentityPayload, InboundEvent, LocationPayload, SignalKind,
    SignalPayload,
};
pub use message::{Delivery, OutboundMessage, Target};
