//! Inbound events
//!
//! Every text frame from a client is a JSON envelope
//! `{"event": "<name>", "data": {...}}`. Decoding only checks the envelope
//! and field types; whether required fields are present is the router's
//! decision, so a payload with missing fields still decodes.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::error::ProtocolError;
use crate::registry::ClientIdentity;

/// Wire name of the register-field event
pub const CONNECT_USER: &str = "connect_user";
/// Wire name of the register-monitor event
pub const CONNECT_ADMIN: &str = "connect_admin";
/// Wire name of the audio-chunk event
pub const AUDIO_CHUNK: &str = "audio_chunk";
/// Wire name of the location-update event
pub const LOCATION_UPDATE: &str = "location_update";
/// Wire name of the subscribe-request event
pub const REQUEST_LISTEN: &str = "request_listen";
/// Wire name of the unsubscribe-request event
pub const STOP_LISTEN: &str = "stop_listen";
/// Wire name of the panic event
pub const PANIC: &str = "panic";
/// Wire name of the auto-dispatch event
pub const AUTO_DISPATCH: &str = "auto_dispatch";
/// Wire name of the rescue signal
pub const SEND_RESCUE: &str = "send_rescue";
/// Wire name of the help signal
pub const SEND_HELP: &str = "send_help";
/// Wire name of the "I am safe" signal
pub const SEND_SAFE: &str = "send_safe";

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

fn present(value: &Option<String>) -> Option<ClientIdentity> {
    value.as_deref().and_then(ClientIdentity::parse)
}

/// Payload naming a single field client
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IdentityPayload {
    #[serde(default, alias = "identity")]
    pub user_id: Option<String>,
}

impl IdentityPayload {
    /// The identity, if present and non-empty
    pub fn identity(&self) -> Option<ClientIdentity> {
        present(&self.user_id)
    }
}

/// Payload of an audio chunk
///
/// `chunk` is kept as raw JSON and forwarded verbatim.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AudioChunkPayload {
    #[serde(default, alias = "identity")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub chunk: Option<Value>,
}

impl AudioChunkPayload {
    /// The identity, if present and non-empty
    pub fn identity(&self) -> Option<ClientIdentity> {
        present(&self.user_id)
    }

    /// The chunk, unless missing or empty
    ///
    /// `null`, `false`, zero and empty strings, arrays or objects carry no
    /// audio and are treated as missing.
    pub fn chunk(&self) -> Option<&Value> {
        self.chunk.as_ref().filter(|chunk| !is_empty_chunk(chunk))
    }
}

fn is_empty_chunk(chunk: &Value) -> bool {
    match chunk {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

/// Payload of a location update
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LocationPayload {
    #[serde(default, alias = "identity")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl LocationPayload {
    /// The identity, if present and non-empty
    pub fn identity(&self) -> Option<ClientIdentity> {
        present(&self.user_id)
    }
}

/// Payload of a panic or auto-dispatch alert
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AlertPayload {
    #[serde(default, alias = "identity")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
}

impl AlertPayload {
    /// The identity, if present and non-empty
    pub fn identity(&self) -> Option<ClientIdentity> {
        present(&self.user_id)
    }

    /// The severity level, if present and non-empty
    pub fn level(&self) -> Option<&str> {
        self.level.as_deref().filter(|l| !l.is_empty())
    }
}

/// Observation-only safety signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Rescue requested
    Rescue,
    /// Help requested
    Help,
    /// Client reports being safe
    Safe,
}

impl SignalKind {
    /// Wire name of the signal
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Rescue => SEND_RESCUE,
            SignalKind::Help => SEND_HELP,
            SignalKind::Safe => SEND_SAFE,
        }
    }
}

/// Payload of a rescue/help/safe signal
///
/// Fields other than the identity are free-form and kept for logging.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SignalPayload {
    #[serde(default, alias = "identity")]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SignalPayload {
    /// The identity, if present and non-empty
    pub fn identity(&self) -> Option<ClientIdentity> {
        present(&self.user_id)
    }
}

/// A decoded inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Caller announces itself as the field client for an identity
    RegisterField(IdentityPayload),
    /// Caller announces itself as a monitor
    RegisterMonitor,
    /// Audio chunk from a field client
    AudioChunk(AudioChunkPayload),
    /// Location update from a field client
    LocationUpdate(LocationPayload),
    /// Monitor asks to follow an identity
    Subscribe(IdentityPayload),
    /// Monitor stops following an identity
    Unsubscribe(IdentityPayload),
    /// Panic alert
    Panic(AlertPayload),
    /// Automatic dispatch alert
    AutoDispatch(AlertPayload),
    /// Rescue/help/safe signal
    Signal(SignalKind, SignalPayload),
}

impl InboundEvent {
    /// Decode a JSON text frame
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(ProtocolError::InvalidEnvelope)?;
        Self::from_parts(&envelope.event, envelope.data)
    }

    /// Build an event from its wire name and `data` value
    ///
    /// A missing or `null` `data` is treated as an empty object.
    pub fn from_parts(name: &str, data: Value) -> Result<Self, ProtocolError> {
        let data = if data.is_null() {
            Value::Object(Map::new())
        } else {
            data
        };

        let event = match name {
            CONNECT_USER => Self::RegisterField(payload(name, data)?),
            CONNECT_ADMIN => Self::RegisterMonitor,
            AUDIO_CHUNK => Self::AudioChunk(payload(name, data)?),
            LOCATION_UPDATE => Self::LocationUpdate(payload(name, data)?),
            REQUEST_LISTEN => Self::Subscribe(payload(name, data)?),
            STOP_LISTEN => Self::Unsubscribe(payload(name, data)?),
            PANIC => Self::Panic(payload(name, data)?),
            AUTO_DISPATCH => Self::AutoDispatch(payload(name, data)?),
            SEND_RESCUE => Self::Signal(SignalKind::Rescue, payload(name, data)?),
            SEND_HELP => Self::Signal(SignalKind::Help, payload(name, data)?),
            SEND_SAFE => Self::Signal(SignalKind::Safe, payload(name, data)?),
            other => return Err(ProtocolError::UnknownEvent(other.to_string())),
        };

        Ok(event)
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::RegisterField(_) => CONNECT_USER,
            Self::RegisterMonitor => CONNECT_ADMIN,
            Self::AudioChunk(_) => AUDIO_CHUNK,
            Self::LocationUpdate(_) => LOCATION_UPDATE,
            Self::Subscribe(_) => REQUEST_LISTEN,
            Self::Unsubscribe(_) => STOP_LISTEN,
            Self::Panic(_) => PANIC,
            Self::AutoDispatch(_) => AUTO_DISPATCH,
            Self::Signal(kind, _) => kind.as_str(),
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(name: &str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidPayload {
        event: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_audio_chunk() {
        let event = InboundEvent::decode(
            r#"{"event":"audio_chunk","data":{"user_id":"u1","chunk":"AAEC"}}"#,
        )
        .unwrap();

        match event {
            InboundEvent::AudioChunk(p) => {
                assert_eq!(p.identity(), Some(ClientIdentity::new("u1")));
                assert_eq!(p.chunk(), Some(&json!("AAEC")));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_identity_alias() {
        let event =
            InboundEvent::decode(r#"{"event":"request_listen","data":{"identity":"u9"}}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::Subscribe(IdentityPayload {
                user_id: Some("u9".into())
            })
        );
    }

    #[test]
    fn test_missing_data_decodes_as_empty() {
        let event = InboundEvent::decode(r#"{"event":"connect_admin"}"#).unwrap();
        assert_eq!(event, InboundEvent::RegisterMonitor);

        let event = InboundEvent::decode(r#"{"event":"connect_user","data":null}"#).unwrap();
        match event {
            InboundEvent::RegisterField(p) => assert!(p.identity().is_none()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_still_decode() {
        let event = InboundEvent::decode(r#"{"event":"audio_chunk","data":{"user_id":"u1"}}"#)
            .unwrap();
        match event {
            InboundEvent::AudioChunk(p) => assert!(p.chunk().is_none()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_empty_strings_count_as_absent() {
        let p: AudioChunkPayload =
            serde_json::from_value(json!({"user_id": "", "chunk": ""})).unwrap();
        assert!(p.identity().is_none());
        assert!(p.chunk().is_none());

        let p: AlertPayload = serde_json::from_value(json!({"user_id": "u1", "level": ""})).unwrap();
        assert!(p.level().is_none());
    }

    #[test]
    fn test_empty_chunks_count_as_absent() {
        for chunk in [json!([]), json!({}), json!(0), json!(false)] {
            let p: AudioChunkPayload =
                serde_json::from_value(json!({"user_id": "u1", "chunk": chunk})).unwrap();
            assert!(p.chunk().is_none(), "chunk {} was kept", chunk);
        }

        let p: AudioChunkPayload =
            serde_json::from_value(json!({"user_id": "u1", "chunk": {"seq": 1}})).unwrap();
        assert_eq!(p.chunk(), Some(&json!({"seq": 1})));
    }

    #[test]
    fn test_chunk_kept_verbatim() {
        let p: AudioChunkPayload =
            serde_json::from_value(json!({"user_id": "u1", "chunk": [1, 2, 3]})).unwrap();
        assert_eq!(p.chunk(), Some(&json!([1, 2, 3])));
    }

    #[test]
    fn test_location_fields() {
        let event = InboundEvent::decode(
            r#"{"event":"location_update","data":{"user_id":"u1","lat":0.0,"lon":-71.5}}"#,
        )
        .unwrap();
        match event {
            InboundEvent::LocationUpdate(p) => {
                assert_eq!(p.lat, Some(0.0));
                assert_eq!(p.lon, Some(-71.5));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_signal_keeps_extra_fields() {
        let event = InboundEvent::decode(
            r#"{"event":"send_help","data":{"user_id":"u1","note":"stuck"}}"#,
        )
        .unwrap();
        match event {
            InboundEvent::Signal(SignalKind::Help, p) => {
                assert_eq!(p.identity(), Some(ClientIdentity::new("u1")));
                assert_eq!(p.extra.get("note"), Some(&json!("stuck")));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event() {
        let err = InboundEvent::decode(r#"{"event":"dance","data":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownEvent(name) if name == "dance"));
    }

    #[test]
    fn test_invalid_json() {
        let err = InboundEvent::decode("not json").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidEnvelope(_)));
    }

    #[test]
    fn test_wrong_field_type_is_invalid_payload() {
        let err = InboundEvent::decode(
            r#"{"event":"location_update","data":{"user_id":"u1","lat":"north"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { ref event, .. } if event == "location_update"));
    }

    #[test]
    fn test_name_round_trips() {
        for name in [CONNECT_USER, AUDIO_CHUNK, PANIC, SEND_SAFE, STOP_LISTEN] {
            let event = InboundEvent::from_parts(name, Value::Null).unwrap();
            assert_eq!(event.name(), name);
        }
    }
}
