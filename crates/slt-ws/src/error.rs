use slt_core::{FrameError, close_code};
use thiserror::Error;

/// Failures surfaced to callers of the lower-thirds client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A request was attempted while the connection is not identified.
    #[error("websocket not connected")]
    NotConnected,
    /// No response arrived before the request deadline.
    #[error("request timeout: {request_type} after {timeout_ms}ms")]
    Timeout {
        request_type: String,
        timeout_ms: u64,
    },
    /// The server answered with a failed request status.
    #[error("{request_type} failed: {code}{}", format_comment(.comment))]
    RequestFailed {
        request_type: String,
        code: u32,
        comment: Option<String>,
    },
    /// The vendor answered `ok: false` inside a successful response.
    #[error("{request_type} rejected by vendor: {message}")]
    Vendor {
        request_type: String,
        message: String,
    },
    /// The connection went away while the request was in flight.
    #[error("websocket channel closed")]
    ChannelClosed,
    /// The server closed the socket with a close frame.
    #[error("connection closed by server: {code}{}", format_close(.code, .reason))]
    Closed { code: u16, reason: String },
    /// Underlying websocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// The identify handshake did not complete.
    #[error("handshake failed: {0}")]
    Handshake(String),
    /// Outbound frame encoding failed.
    #[error("failed to encode frame: {0}")]
    Encode(String),
    /// Inbound frame or payload decoding failed.
    #[error("failed to decode frame: {0}")]
    Decode(String),
    /// An in-flight request already uses this identifier.
    #[error("duplicate request id {0}")]
    DuplicateRequestId(String),
    /// A client-internal lock was poisoned by a panicking holder.
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        Self::Decode(err.to_string())
    }
}

fn format_comment(comment: &Option<String>) -> String {
    comment
        .as_deref()
        .filter(|value| !value.is_empty())
        .map(|value| format!(" {value}"))
        .unwrap_or_default()
}

fn format_close(code: &u16, reason: &str) -> String {
    match (close_code::describe(*code), reason.is_empty()) {
        (_, false) => format!(" ({reason})"),
        (Some(known), true) => format!(" ({known})"),
        (None, true) => String::new(),
    }
}
