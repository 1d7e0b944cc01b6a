use serde::Serialize;
use slt_core::ServerFrame;

use crate::ClientError;

/// Serializes a value to JSON text for one websocket message.
pub fn encode<T: Serialize>(value: &T) -> Result<String, ClientError> {
    serde_json::to_string(value).map_err(|err| ClientError::Encode(err.to_string()))
}

/// Parses one inbound websocket text message.
pub fn decode_server_frame(text: &str) -> Result<ServerFrame, ClientError> {
    ServerFrame::from_json(text).map_err(ClientError::from)
}
