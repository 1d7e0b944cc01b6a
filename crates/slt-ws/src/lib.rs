//! Async WebSocket client for the lower-thirds remote-control protocol.
//!
//! [`SltClient`] owns one identified connection. Requests are correlated with
//! their responses by request id; events are routed through an
//! [`EventRouter`].

mod error;

pub mod client;
pub mod codec;
pub mod correlator;
pub mod events;

pub use client::{
    ConnectOptions, ConnectionState, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, SltClient,
};
pub use correlator::Correlator;
pub use error::ClientError;
pub use events::{Event, EventHandler, EventRouter};
