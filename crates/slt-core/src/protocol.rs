use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{FrameError, RequestId, RequestStatus};

/// RPC version requested when the server does not announce one.
pub const RPC_VERSION: u32 = 1;

/// Operation code carried in every frame's `op` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum OpCode {
    /// Server greeting, first frame on a new socket.
    Hello = 0,
    /// Client identification, optionally authenticated.
    Identify = 1,
    /// Server acknowledgment of a successful identify.
    Identified = 2,
    /// Client update of session parameters after identify.
    Reidentify = 3,
    /// Server-pushed event.
    Event = 5,
    /// Client request.
    Request = 6,
    /// Server reply to a client request.
    RequestResponse = 7,
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op as u8
    }
}

impl TryFrom<u8> for OpCode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Hello),
            1 => Ok(Self::Identify),
            2 => Ok(Self::Identified),
            3 => Ok(Self::Reidentify),
            5 => Ok(Self::Event),
            6 => Ok(Self::Request),
            7 => Ok(Self::RequestResponse),
            other => Err(FrameError::UnknownOpCode(other)),
        }
    }
}

/// Bitmask values for the `eventSubscriptions` identify field.
pub mod event_subscription {
    pub const NONE: u32 = 0;
    pub const GENERAL: u32 = 1 << 0;
    pub const CONFIG: u32 = 1 << 1;
    pub const SCENES: u32 = 1 << 2;
    pub const INPUTS: u32 = 1 << 3;
    pub const TRANSITIONS: u32 = 1 << 4;
    pub const FILTERS: u32 = 1 << 5;
    pub const OUTPUTS: u32 = 1 << 6;
    pub const SCENE_ITEMS: u32 = 1 << 7;
    pub const MEDIA_INPUTS: u32 = 1 << 8;
    pub const VENDORS: u32 = 1 << 9;
    pub const UI: u32 = 1 << 10;
    pub const ALL: u32 = GENERAL
        | CONFIG
        | SCENES
        | INPUTS
        | TRANSITIONS
        | FILTERS
        | OUTPUTS
        | SCENE_ITEMS
        | MEDIA_INPUTS
        | VENDORS
        | UI;
}

/// Wire envelope wrapping every frame payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Operation code identifying the payload type.
    pub op: OpCode,
    /// Typed payload.
    pub d: T,
}

/// Payload types that travel under a fixed op code.
pub trait Frame: Sized {
    const OP: OpCode;

    /// Wraps the payload in its wire envelope.
    fn into_envelope(self) -> Envelope<Self> {
        Envelope { op: Self::OP, d: self }
    }
}

/// Challenge issued by the server when authentication is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloAuth {
    pub challenge: String,
    pub salt: String,
}

/// First frame sent by the server after the socket opens.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obs_web_socket_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<HelloAuth>,
}

impl Hello {
    /// RPC version to echo back in identify; zero or missing falls back to
    /// [`RPC_VERSION`].
    pub fn negotiated_rpc_version(&self) -> u32 {
        self.rpc_version
            .filter(|version| *version > 0)
            .unwrap_or(RPC_VERSION)
    }
}

impl Frame for Hello {
    const OP: OpCode = OpCode::Hello;
}

/// Client identification sent in reply to [`Hello`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    /// Authentication proof; omitted entirely when not computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    pub event_subscriptions: u32,
}

impl Frame for Identify {
    const OP: OpCode = OpCode::Identify;
}

/// Server acknowledgment that the session is identified.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    #[serde(default)]
    pub negotiated_rpc_version: u32,
}

impl Frame for Identified {
    const OP: OpCode = OpCode::Identified;
}

/// Updates the event subscription mask of an identified session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reidentify {
    pub event_subscriptions: u32,
}

impl Frame for Reidentify {
    const OP: OpCode = OpCode::Reidentify;
}

/// Server-pushed event, never correlated with a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrame {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_intent: Option<u32>,
    #[serde(default)]
    pub event_data: Value,
}

impl Frame for EventFrame {
    const OP: OpCode = OpCode::Event;
}

/// Outbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFrame {
    pub request_type: String,
    pub request_id: RequestId,
    #[serde(default)]
    pub request_data: Value,
}

impl Frame for RequestFrame {
    const OP: OpCode = OpCode::Request;
}

/// Server reply to a [`RequestFrame`], matched by `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: RequestId,
    pub request_status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
}

impl Frame for RequestResponse {
    const OP: OpCode = OpCode::RequestResponse;
}

/// Any frame a server may send to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Hello(Hello),
    Identified(Identified),
    Event(EventFrame),
    RequestResponse(RequestResponse),
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    op: u8,
    #[serde(default)]
    d: Value,
}

impl ServerFrame {
    /// Parses one text frame, dispatching on its op code.
    pub fn from_json(text: &str) -> Result<Self, FrameError> {
        let raw: RawEnvelope = serde_json::from_str(text)?;
        let frame = match OpCode::try_from(raw.op)? {
            OpCode::Hello => Self::Hello(serde_json::from_value(raw.d)?),
            OpCode::Identified => Self::Identified(serde_json::from_value(raw.d)?),
            OpCode::Event => Self::Event(serde_json::from_value(raw.d)?),
            OpCode::RequestResponse => Self::RequestResponse(serde_json::from_value(raw.d)?),
            op @ (OpCode::Identify | OpCode::Reidentify | OpCode::Request) => {
                return Err(FrameError::UnexpectedOpCode(op.into()));
            }
        };
        Ok(frame)
    }

    /// Op code of the decoded frame.
    pub fn op(&self) -> OpCode {
        match self {
            Self::Hello(_) => OpCode::Hello,
            Self::Identified(_) => OpCode::Identified,
            Self::Event(_) => OpCode::Event,
            Self::RequestResponse(_) => OpCode::RequestResponse,
        }
    }
}
