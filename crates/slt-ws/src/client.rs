use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use slt_core::{
    CallVendorRequest, Frame, Identify, LowerThird, LowerThirdList, Reidentify, RequestFrame,
    RequestId, RequestIdGen, RequestResponse, ServerFrame, VendorRequest, Visibility,
    VisibleIds, event_subscription, identify_authentication,
    vendor::{CALL_VENDOR_REQUEST, decode_response, unwrap_response_data, vendor_error},
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tracing::{debug, info, warn};

use crate::{
    ClientError,
    codec::{decode_server_frame, encode},
    correlator::Correlator,
    events::{Event, EventRouter},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Per-request deadline used when none is given.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
/// Deadline for opening the socket and for completing identify.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// How long `close` waits for the server to acknowledge the close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle of one connection. Advances only on inbound frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    SocketOpen,
    HelloReceived,
    Identified,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::SocketOpen => "socket-open",
            Self::HelloReceived => "hello-received",
            Self::Identified => "identified",
        }
    }
}

/// Parameters for [`SltClient::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// WebSocket URL, e.g. `ws://127.0.0.1:4455`.
    pub url: String,
    /// Password used to answer an authentication challenge.
    pub password: Option<String>,
    /// Event categories requested in identify.
    pub event_subscriptions: u32,
    /// Default per-request deadline.
    pub request_timeout: Duration,
    /// Deadline for socket open and for the identify handshake.
    pub handshake_timeout: Duration,
    /// Handlers for server events.
    pub events: EventRouter,
}

impl ConnectOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            password: None,
            event_subscriptions: event_subscription::NONE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            events: EventRouter::new(),
        }
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn with_event_subscriptions(mut self, mask: u32) -> Self {
        self.event_subscriptions = mask;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_events(mut self, events: EventRouter) -> Self {
        self.events = events;
        self
    }
}

/// State shared between the client handle and its I/O tasks.
struct Shared {
    pending: Mutex<Correlator>,
    state: watch::Sender<ConnectionState>,
}

impl Shared {
    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = previous.as_str(), to = next.as_str(), "connection state changed");
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Pending-map access for the I/O tasks, where there is no caller to
    /// report poisoning to. Correlator updates never panic half-way.
    fn pending(&self) -> MutexGuard<'_, Correlator> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks the connection gone and rejects every in-flight request.
    fn disconnect(&self, cause: impl FnMut() -> ClientError) {
        self.set_state(ConnectionState::Disconnected);
        let rejected = self.pending().fail_all(cause);
        if rejected > 0 {
            warn!(rejected, "connection lost with requests in flight");
        }
    }
}

/// Removes its pending entry when the waiting call finishes or is dropped.
struct PendingEntry<'a> {
    shared: &'a Shared,
    id: RequestId,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        let _ = self.shared.pending().cancel(&self.id);
    }
}

/// Identified connection to the server.
///
/// Requests may be issued concurrently; responses are matched by request id
/// in whatever order they arrive.
pub struct SltClient {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Message>,
    ids: Mutex<RequestIdGen>,
    request_timeout: Duration,
    rpc_version: u32,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl SltClient {
    /// Opens the socket and completes the hello/identify handshake. Returns
    /// only once the server has acknowledged identify.
    pub async fn connect(options: ConnectOptions) -> Result<Self, ClientError> {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let shared = Arc::new(Shared {
            pending: Mutex::new(Correlator::new()),
            state,
        });

        info!(url = %options.url, "connecting");
        let (mut ws, _) = timeout(options.handshake_timeout, connect_async(options.url.as_str()))
            .await
            .map_err(|_| ClientError::Handshake("timed out opening socket".to_string()))??;
        shared.set_state(ConnectionState::SocketOpen);

        let rpc_version = match timeout(
            options.handshake_timeout,
            handshake(&mut ws, &shared, &options),
        )
        .await
        {
            Ok(Ok(version)) => version,
            Ok(Err(err)) => {
                shared.set_state(ConnectionState::Disconnected);
                return Err(err);
            }
            Err(_) => {
                shared.set_state(ConnectionState::Disconnected);
                let _ = ws.close(None).await;
                return Err(ClientError::Handshake(
                    "timed out waiting for identify acknowledgment".to_string(),
                ));
            }
        };
        shared.set_state(ConnectionState::Identified);

        let (sink, stream) = ws.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(sink, outbound_rx, Arc::clone(&shared)));
        let reader = tokio::spawn(read_loop(stream, Arc::clone(&shared), options.events));

        Ok(Self {
            shared,
            outbound,
            ids: Mutex::new(RequestIdGen::new()),
            request_timeout: options.request_timeout,
            rpc_version,
            reader,
            writer,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Watches connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// RPC version agreed during identify.
    pub fn rpc_version(&self) -> u32 {
        self.rpc_version
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending().len()
    }

    /// Sends one request and waits for its response under the default
    /// deadline.
    pub async fn call(
        &self,
        request_type: &str,
        request_data: Value,
    ) -> Result<RequestResponse, ClientError> {
        self.call_with_timeout(request_type, request_data, self.request_timeout)
            .await
    }

    /// Sends one request and waits up to `deadline` for its response.
    pub async fn call_with_timeout(
        &self,
        request_type: &str,
        request_data: Value,
        deadline: Duration,
    ) -> Result<RequestResponse, ClientError> {
        self.send_request(request_type, request_type, request_data, deadline)
            .await
    }

    /// Sends a vendor request wrapped in `CallVendorRequest`. Failures carry
    /// the vendor request type; an `ok: false` payload becomes
    /// [`ClientError::Vendor`].
    pub async fn call_vendor(
        &self,
        vendor_name: &str,
        request_type: &str,
        request_data: Value,
    ) -> Result<RequestResponse, ClientError> {
        self.send_vendor(CallVendorRequest::new(vendor_name, request_type, request_data))
            .await
    }

    /// Sends a typed lower-thirds vendor request.
    pub async fn lower_thirds(&self, request: &VendorRequest) -> Result<RequestResponse, ClientError> {
        self.send_vendor(CallVendorRequest::lower_thirds(request)).await
    }

    pub async fn list_lower_thirds(&self) -> Result<Vec<LowerThird>, ClientError> {
        let response = self.lower_thirds(&VendorRequest::ListLowerThirds).await?;
        let list: LowerThirdList = decode_payload(&response)?;
        Ok(list.items)
    }

    pub async fn visible_ids(&self) -> Result<Vec<String>, ClientError> {
        let response = self.lower_thirds(&VendorRequest::GetVisible).await?;
        let visible: VisibleIds = decode_payload(&response)?;
        Ok(visible.visible_ids.into_iter().map(|entry| entry.id).collect())
    }

    pub async fn set_visible(&self, id: &str, visible: bool) -> Result<Visibility, ClientError> {
        let response = self
            .lower_thirds(&VendorRequest::SetVisible {
                id: id.to_string(),
                visible,
            })
            .await?;
        decode_payload(&response)
    }

    pub async fn toggle_visible(&self, id: &str) -> Result<Visibility, ClientError> {
        let response = self
            .lower_thirds(&VendorRequest::ToggleVisible { id: id.to_string() })
            .await?;
        decode_payload(&response)
    }

    /// Changes the event subscription mask of the identified session.
    pub fn reidentify(&self, event_subscriptions: u32) -> Result<(), ClientError> {
        if self.state() != ConnectionState::Identified {
            return Err(ClientError::NotConnected);
        }
        let text = encode(&Reidentify { event_subscriptions }.into_envelope())?;
        self.outbound
            .send(Message::Text(text.into()))
            .map_err(|_| ClientError::NotConnected)
    }

    /// Closes the connection. In-flight requests are rejected immediately
    /// with [`ClientError::ChannelClosed`].
    pub async fn close(mut self) {
        let _ = self.outbound.send(Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "client closing".into(),
        })));
        self.shared.disconnect(|| ClientError::ChannelClosed);

        let _ = (&mut self.writer).await;
        if timeout(CLOSE_GRACE, &mut self.reader).await.is_err() {
            debug!("server did not acknowledge close");
        }
    }

    async fn send_vendor(&self, wrapped: CallVendorRequest) -> Result<RequestResponse, ClientError> {
        let request_data =
            serde_json::to_value(&wrapped).map_err(|err| ClientError::Encode(err.to_string()))?;
        let response = self
            .send_request(
                &wrapped.request_type,
                CALL_VENDOR_REQUEST,
                request_data,
                self.request_timeout,
            )
            .await?;

        if let Some(message) = unwrap_response_data(&response).and_then(vendor_error) {
            return Err(ClientError::Vendor {
                request_type: wrapped.request_type,
                message,
            });
        }
        Ok(response)
    }

    async fn send_request(
        &self,
        request_type: &str,
        wire_type: &str,
        request_data: Value,
        deadline: Duration,
    ) -> Result<RequestResponse, ClientError> {
        let request_id = self
            .ids
            .lock()
            .map_err(|_| ClientError::LockPoisoned("request id"))?
            .next_id();
        let frame = RequestFrame {
            request_type: wire_type.to_string(),
            request_id: request_id.clone(),
            request_data,
        };
        let text = encode(&frame.into_envelope())?;

        let receiver = {
            let mut pending = self
                .shared
                .pending
                .lock()
                .map_err(|_| ClientError::LockPoisoned("pending request"))?;
            // checked under the lock so a concurrent disconnect either sees
            // this entry or is seen here
            if self.shared.state() != ConnectionState::Identified {
                return Err(ClientError::NotConnected);
            }
            pending.register(request_id.clone(), request_type)?
        };
        let _entry = PendingEntry {
            shared: &self.shared,
            id: request_id.clone(),
        };

        debug!(request_id = %request_id, request_type, "sending request");
        self.outbound
            .send(Message::Text(text.into()))
            .map_err(|_| ClientError::NotConnected)?;

        match timeout(deadline, receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ClientError::ChannelClosed),
            Err(_) => {
                warn!(request_id = %request_id, request_type, "request timed out");
                Err(ClientError::Timeout {
                    request_type: request_type.to_string(),
                    timeout_ms: deadline.as_millis().try_into().unwrap_or(u64::MAX),
                })
            }
        }
    }
}

impl Drop for SltClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

fn decode_payload<T: DeserializeOwned>(response: &RequestResponse) -> Result<T, ClientError> {
    decode_response(response).map_err(|err| ClientError::Decode(err.to_string()))
}

/// Waits for hello, answers with identify, and waits for the acknowledgment.
/// Returns the negotiated RPC version.
async fn handshake(
    ws: &mut WsStream,
    shared: &Shared,
    options: &ConnectOptions,
) -> Result<u32, ClientError> {
    let hello = match next_frame(ws).await? {
        ServerFrame::Hello(hello) => hello,
        other => {
            return Err(ClientError::Handshake(format!(
                "expected hello, got op {}",
                u8::from(other.op())
            )));
        }
    };
    shared.set_state(ConnectionState::HelloReceived);

    let rpc_version = hello.negotiated_rpc_version();
    let authentication =
        identify_authentication(hello.authentication.as_ref(), options.password.as_deref());
    if hello.authentication.is_some() && authentication.is_none() {
        warn!("server requested authentication but no password is configured");
    }

    debug!(
        server_version = hello.obs_web_socket_version.as_deref().unwrap_or("unknown"),
        rpc_version,
        authenticated = authentication.is_some(),
        "sending identify"
    );
    let identify = Identify {
        rpc_version,
        authentication,
        event_subscriptions: options.event_subscriptions,
    };
    ws.send(Message::Text(encode(&identify.into_envelope())?.into()))
        .await?;

    match next_frame(ws).await? {
        ServerFrame::Identified(identified) if identified.negotiated_rpc_version > 0 => {
            Ok(identified.negotiated_rpc_version)
        }
        ServerFrame::Identified(_) => Ok(rpc_version),
        other => Err(ClientError::Handshake(format!(
            "expected identified, got op {}",
            u8::from(other.op())
        ))),
    }
}

/// Next decodable server frame during the handshake; malformed text is
/// skipped.
async fn next_frame(ws: &mut WsStream) -> Result<ServerFrame, ClientError> {
    while let Some(message) = ws.next().await {
        match message? {
            Message::Text(text) => match decode_server_frame(text.as_str()) {
                Ok(frame) => return Ok(frame),
                Err(err) => debug!(error = %err, "ignoring malformed frame"),
            },
            Message::Close(frame) => return Err(close_error(frame.as_ref())),
            _ => {}
        }
    }
    Err(ClientError::ChannelClosed)
}

fn close_error(frame: Option<&CloseFrame>) -> ClientError {
    match frame {
        Some(frame) => ClientError::Closed {
            code: u16::from(frame.code),
            reason: frame.reason.as_str().to_string(),
        },
        None => ClientError::ChannelClosed,
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    shared: Arc<Shared>,
) {
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(err) = sink.send(message).await {
            warn!(error = %err, "websocket write failed");
            shared.disconnect(|| ClientError::ChannelClosed);
            return;
        }
        if closing {
            return;
        }
    }
}

/// Processes inbound frames strictly in arrival order until the socket ends.
async fn read_loop(mut stream: SplitStream<WsStream>, shared: Arc<Shared>, events: EventRouter) {
    let mut close: Option<(u16, String)> = None;

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "websocket read failed");
                break;
            }
        };

        match message {
            Message::Text(text) => match decode_server_frame(text.as_str()) {
                Ok(frame) => handle_frame(frame, &shared, &events).await,
                Err(err) => debug!(error = %err, "ignoring malformed frame"),
            },
            Message::Close(frame) => {
                if let Some(frame) = frame {
                    let code = u16::from(frame.code);
                    info!(code, reason = frame.reason.as_str(), "server closed connection");
                    close = Some((code, frame.reason.as_str().to_string()));
                }
                break;
            }
            _ => {}
        }
    }

    shared.disconnect(|| match &close {
        Some((code, reason)) => ClientError::Closed {
            code: *code,
            reason: reason.clone(),
        },
        None => ClientError::ChannelClosed,
    });
}

async fn handle_frame(frame: ServerFrame, shared: &Shared, events: &EventRouter) {
    match frame {
        ServerFrame::RequestResponse(response) => {
            let _ = shared.pending().complete(response);
        }
        ServerFrame::Event(frame) => {
            let event = Event::from_frame(frame);
            let _ = events.dispatch(&event).await;
        }
        ServerFrame::Identified(identified) => {
            debug!(
                rpc_version = identified.negotiated_rpc_version,
                "identify acknowledged again"
            );
        }
        ServerFrame::Hello(_) => warn!("ignoring hello on identified connection"),
    }
}
