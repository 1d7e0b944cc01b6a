//! Wire types and helpers shared by the lower-thirds remote-control client.

pub mod auth;
pub mod errors;
pub mod ids;
pub mod paths;
pub mod protocol;
pub mod vendor;

pub use auth::{auth_proof, identify_authentication};
pub use errors::{FrameError, RequestStatus, close_code, status};
pub use ids::{RequestId, RequestIdGen};
pub use paths::default_state_dir;
pub use protocol::{
    Envelope, EventFrame, Frame, Hello, HelloAuth, Identified, Identify, OpCode, RPC_VERSION,
    Reidentify, RequestFrame, RequestResponse, ServerFrame, event_subscription,
};
pub use vendor::{
    CallVendorRequest, LowerThird, LowerThirdList, VENDOR_NAME, VendorAck, VendorEvent,
    VendorRequest, Visibility, VisibilityChanged, VisibleIds,
};
