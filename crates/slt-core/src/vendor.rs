//! Payloads of the lower-thirds vendor extension.
//!
//! Vendor requests travel inside a generic `CallVendorRequest`; vendor events
//! arrive as generic `VendorEvent` events with the vendor's own event type
//! nested in `eventData`.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};

use crate::RequestResponse;

/// Vendor name the plugin registers with the server.
pub const VENDOR_NAME: &str = "smart-lower-thirds";
/// Generic request type wrapping every vendor request.
pub const CALL_VENDOR_REQUEST: &str = "CallVendorRequest";
/// Generic event type wrapping every vendor event.
pub const VENDOR_EVENT: &str = "VendorEvent";
/// Vendor event emitted when a lower third is shown or hidden.
pub const VISIBILITY_CHANGED: &str = "LowerThirdsVisibilityChanged";

/// Maximum number of nested `responseData` levels unwrapped.
const MAX_RESPONSE_NESTING: usize = 2;

/// Requests understood by the lower-thirds vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorRequest {
    /// Lists every configured lower third.
    ListLowerThirds,
    /// Returns ids of the currently visible lower thirds.
    GetVisible,
    /// Shows or hides one lower third.
    SetVisible {
        /// Target lower-third id.
        id: String,
        /// Desired visibility.
        visible: bool,
    },
    /// Flips visibility of one lower third.
    ToggleVisible {
        /// Target lower-third id.
        id: String,
    },
}

impl VendorRequest {
    pub fn request_type(&self) -> &'static str {
        match self {
            Self::ListLowerThirds => "ListLowerThirds",
            Self::GetVisible => "GetVisible",
            Self::SetVisible { .. } => "SetVisible",
            Self::ToggleVisible { .. } => "ToggleVisible",
        }
    }

    pub fn request_data(&self) -> Value {
        match self {
            Self::ListLowerThirds | Self::GetVisible => Value::Object(Map::new()),
            Self::SetVisible { id, visible } => json!({ "id": id, "visible": visible }),
            Self::ToggleVisible { id } => json!({ "id": id }),
        }
    }
}

/// `requestData` of a `CallVendorRequest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallVendorRequest {
    pub vendor_name: String,
    pub request_type: String,
    #[serde(default)]
    pub request_data: Value,
}

impl CallVendorRequest {
    pub fn new(vendor_name: &str, request_type: &str, request_data: Value) -> Self {
        Self {
            vendor_name: vendor_name.to_string(),
            request_type: request_type.to_string(),
            request_data,
        }
    }

    /// Wraps a typed request for the lower-thirds vendor.
    pub fn lower_thirds(request: &VendorRequest) -> Self {
        Self::new(VENDOR_NAME, request.request_type(), request.request_data())
    }
}

/// Returns the innermost response payload, descending through up to two
/// nested `responseData` objects.
pub fn unwrap_response_data(response: &RequestResponse) -> Option<&Value> {
    let mut current = response.response_data.as_ref()?;
    for _ in 0..MAX_RESPONSE_NESTING {
        match current.get("responseData") {
            Some(inner) if inner.is_object() => current = inner,
            _ => break,
        }
    }
    Some(current)
}

/// Decodes the unwrapped response payload; a missing payload decodes as `{}`.
pub fn decode_response<T: DeserializeOwned>(response: &RequestResponse) -> Result<T, serde_json::Error> {
    match unwrap_response_data(response) {
        Some(value) => T::deserialize(value),
        None => serde_json::from_value(Value::Object(Map::new())),
    }
}

/// Acknowledgment the plugin returns from mutating requests. A rejected
/// request still carries a successful request status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorAck {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Error reported by the vendor inside an otherwise successful response,
/// i.e. a payload carrying `"ok": false`.
pub fn vendor_error(payload: &Value) -> Option<String> {
    let ack = VendorAck::deserialize(payload).ok()?;
    if ack.ok {
        return None;
    }
    Some(ack.error.unwrap_or_else(|| "unknown".to_string()))
}

/// One configured lower third.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LowerThird {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub is_visible: bool,
    pub repeat_every_sec: i64,
    pub repeat_visible_sec: i64,
    pub hotkey: String,
}

/// Reply to `ListLowerThirds`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LowerThirdList {
    #[serde(default)]
    pub items: Vec<LowerThird>,
}

/// Reference to a lower third by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

/// Reply to `GetVisible`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleIds {
    #[serde(default)]
    pub visible_ids: Vec<IdRef>,
}

/// Reply to `SetVisible` and `ToggleVisible`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    pub id: String,
    pub visible: bool,
}

/// `eventData` of a generic `VendorEvent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorEvent {
    pub vendor_name: String,
    pub event_type: String,
    #[serde(default)]
    pub event_data: Value,
}

/// Payload of [`VISIBILITY_CHANGED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityChanged {
    pub id: String,
    pub visible: bool,
    #[serde(default)]
    pub visible_ids: Vec<IdRef>,
}
