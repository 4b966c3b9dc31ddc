//! JSON envelopes exchanged with the calling application, one per line

use multipeer_session_core::{InvitationId, PeerId};
use multipeer_session_p2p::{EventCategory, SessionError, SessionEvent};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Number, Value};

/// A call from the application
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Text or number; numbers are echoed back in their decimal form
    #[serde(deserialize_with = "deserialize_call_id")]
    #[schemars(with = "RawCallId")]
    pub call_id: String,
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Parse one line, keeping the call id when only the command is malformed
    pub fn parse(line: &str) -> Result<Self, (Option<String>, String)> {
        let value: Value = serde_json::from_str(line).map_err(|e| (None, e.to_string()))?;
        let call_id = value
            .get("callId")
            .cloned()
            .and_then(|raw| serde_json::from_value::<RawCallId>(raw).ok())
            .map(RawCallId::into_string);

        serde_json::from_value(value).map_err(|e| (call_id, e.to_string()))
    }
}

#[derive(Deserialize, JsonSchema)]
#[serde(untagged)]
enum RawCallId {
    Text(String),
    Number(Number),
}

impl RawCallId {
    fn into_string(self) -> String {
        match self {
            RawCallId::Text(text) => text,
            RawCallId::Number(number) => number.to_string(),
        }
    }
}

fn deserialize_call_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawCallId::deserialize(deserializer).map(RawCallId::into_string)
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(tag = "action", content = "args", rename_all = "camelCase")]
pub enum Command {
    GetLocalPeerInfo,
    StartAdvertising {
        #[serde(rename = "serviceType")]
        service_type: String,
    },
    StopAdvertising,
    StartBrowsing {
        #[serde(rename = "serviceType")]
        service_type: String,
    },
    StopBrowsing,
    InvitePeer {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
    },
    AcceptInvitation {
        #[serde(rename = "invitationId")]
        invitation_id: InvitationId,
    },
    DeclineInvitation {
        #[serde(rename = "invitationId")]
        invitation_id: InvitationId,
    },
    Disconnect,
    GetConnectedPeers,
    SendDataReliable {
        peers: PeerSelection,
        data: Payload,
    },
    SendDataUnreliable {
        peers: PeerSelection,
        data: Payload,
    },
    /// Stream every event of one category under this call id
    Register {
        event: EventCategory,
    },
}

/// A single peer id or a list of them
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PeerSelection {
    One(PeerId),
    Many(Vec<PeerId>),
}

impl PeerSelection {
    pub fn into_vec(self) -> Vec<PeerId> {
        match self {
            PeerSelection::One(id) => vec![id],
            PeerSelection::Many(ids) => ids,
        }
    }
}

/// Raw bytes, or text sent as its UTF-8 encoding
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Payload {
    Bytes(Vec<u8>),
    Text(String),
}

impl Payload {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Bytes(bytes) => bytes,
            Payload::Text(text) => text.into_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Answer to a call, or one event of a registered stream
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub call_id: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub keep_callback: bool,
}

/// Payload of an error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

impl Response {
    pub fn ok(call_id: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            call_id: call_id.into(),
            status: Status::Ok,
            payload,
            keep_callback: false,
        }
    }

    pub fn error(call_id: impl Into<String>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        let payload = ErrorPayload {
            kind: kind.into(),
            message: message.into(),
        };
        Self {
            call_id: call_id.into(),
            status: Status::Error,
            payload: serde_json::to_value(payload).ok(),
            keep_callback: false,
        }
    }

    pub fn from_session_error(call_id: impl Into<String>, error: &SessionError) -> Self {
        Self::error(call_id, error.kind().to_string(), error.to_string())
    }

    /// One event of a registered stream
    pub fn event(call_id: impl Into<String>, event: &SessionEvent) -> Self {
        Self {
            call_id: call_id.into(),
            status: Status::Ok,
            payload: Some(event_payload(event)),
            keep_callback: true,
        }
    }
}

/// Shape an event the way the application expects it
pub fn event_payload(event: &SessionEvent) -> Value {
    match event {
        SessionEvent::AdvertisingError(message) | SessionEvent::BrowsingError(message) => {
            json!(message)
        }
        SessionEvent::FoundPeer(peer) | SessionEvent::LostPeer(peer) => json!(peer),
        SessionEvent::ReceiveInvitation {
            peer,
            invitation_id,
        } => json!([peer, invitation_id]),
        SessionEvent::ReceiveData { peer, data } => json!([peer, data]),
        SessionEvent::ChangeState { peer, state } => json!([peer, state]),
    }
}

/// JSON schema of both envelopes
pub fn schema() -> Value {
    json!({
        "request": schemars::schema_for!(Request),
        "response": schemars::schema_for!(Response),
    })
}
