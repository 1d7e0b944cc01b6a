use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome reported by the server for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatus {
    /// True when the request succeeded.
    pub result: bool,
    /// Numeric status code, see [`status`].
    pub code: u32,
    /// Optional human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Request status codes the client reacts to.
pub mod status {
    /// No handler is registered for the request type. For vendor requests:
    /// the vendor exists but does not know the request.
    pub const UNKNOWN_REQUEST_TYPE: u32 = 204;
    /// The server is still starting up.
    pub const NOT_READY: u32 = 207;
    /// For vendor requests: no vendor is registered under that name.
    pub const RESOURCE_NOT_FOUND: u32 = 600;
}

/// WebSocket close codes the server uses to end a session.
pub mod close_code {
    pub const UNKNOWN_OP_CODE: u16 = 4006;
    pub const NOT_IDENTIFIED: u16 = 4007;
    pub const ALREADY_IDENTIFIED: u16 = 4008;
    pub const AUTHENTICATION_FAILED: u16 = 4009;
    pub const UNSUPPORTED_RPC_VERSION: u16 = 4010;

    /// Short description for a known close code.
    pub fn describe(code: u16) -> Option<&'static str> {
        match code {
            UNKNOWN_OP_CODE => Some("unknown op code"),
            NOT_IDENTIFIED => Some("not identified"),
            ALREADY_IDENTIFIED => Some("already identified"),
            AUTHENTICATION_FAILED => Some("authentication failed"),
            UNSUPPORTED_RPC_VERSION => Some("unsupported rpc version"),
            _ => None,
        }
    }
}

/// Failure to interpret an inbound text frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Text was not valid JSON or did not match the frame shape.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    /// Envelope carried an op code this client does not know.
    #[error("unknown op code {0}")]
    UnknownOpCode(u8),
    /// Op code is valid but only ever sent by clients.
    #[error("unexpected client op code {0}")]
    UnexpectedOpCode(u8),
}
