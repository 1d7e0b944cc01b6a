use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use slt_core::{EventFrame, VendorEvent, vendor::VENDOR_EVENT};

/// Server event after vendor unwrapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Generic server event.
    Server {
        event_type: String,
        event_data: Value,
    },
    /// Event emitted by a vendor extension.
    Vendor(VendorEvent),
}

impl Event {
    /// Unwraps `VendorEvent` envelopes; everything else stays generic.
    pub fn from_frame(frame: EventFrame) -> Self {
        if frame.event_type == VENDOR_EVENT {
            match serde_json::from_value::<VendorEvent>(frame.event_data.clone()) {
                Ok(vendor) => return Self::Vendor(vendor),
                Err(err) => {
                    tracing::debug!(error = %err, "vendor event without vendor envelope");
                }
            }
        }

        Self::Server {
            event_type: frame.event_type,
            event_data: frame.event_data,
        }
    }

    /// Key the event is routed by: the vendor's own event type for vendor
    /// events, the server event type otherwise.
    pub fn event_type(&self) -> &str {
        match self {
            Self::Server { event_type, .. } => event_type,
            Self::Vendor(vendor) => &vendor.event_type,
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            Self::Server { event_data, .. } => event_data,
            Self::Vendor(vendor) => &vendor.event_data,
        }
    }
}

/// Receives events routed to it by an [`EventRouter`].
///
/// Handlers run inside the connection's read loop, one event at a time. A
/// handler must not wait on a request over the same connection: its response
/// cannot be read until the handler returns.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: &Event);
}

/// Routes events to handlers keyed by event type.
#[derive(Clone, Default)]
pub struct EventRouter {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
    fallback: Option<Arc<dyn EventHandler>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for one event type, replacing any previous one.
    pub fn on(mut self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.insert(event_type.into(), handler);
        self
    }

    /// Handler for events no typed handler claims.
    pub fn fallback(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.fallback = Some(handler);
        self
    }

    /// Runs the handler for `event` to completion. Returns `false` when the
    /// event type has no handler.
    pub async fn dispatch(&self, event: &Event) -> bool {
        let handler = self
            .handlers
            .get(event.event_type())
            .or(self.fallback.as_ref());

        match handler {
            Some(handler) => {
                handler.handle(event).await;
                true
            }
            None => {
                tracing::debug!(event_type = event.event_type(), "no handler for event");
                false
            }
        }
    }
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().collect();
        types.sort();
        f.debug_struct("EventRouter")
            .field("event_types", &types)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;
    use slt_core::EventFrame;

    use super::{Event, EventHandler, EventRouter};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: &Event) {
            self.seen
                .lock()
                .expect("recorder lock")
                .push(event.event_type().to_string());
        }
    }

    fn vendor_frame() -> EventFrame {
        EventFrame {
            event_type: "VendorEvent".to_string(),
            event_intent: Some(512),
            event_data: json!({
                "vendorName": "smart-lower-thirds",
                "eventType": "LowerThirdsVisibilityChanged",
                "eventData": { "id": "lt_1", "visible": false }
            }),
        }
    }

    #[test]
    fn vendor_events_unwrap_to_inner_type() {
        let event = Event::from_frame(vendor_frame());
        assert_eq!(event.event_type(), "LowerThirdsVisibilityChanged");
        assert_eq!(event.data()["id"], "lt_1");
        assert!(matches!(event, Event::Vendor(_)));
    }

    #[test]
    fn malformed_vendor_envelope_stays_generic() {
        let event = Event::from_frame(EventFrame {
            event_type: "VendorEvent".to_string(),
            event_intent: None,
            event_data: json!({ "unexpected": true }),
        });
        assert_eq!(event.event_type(), "VendorEvent");
    }

    #[tokio::test]
    async fn dispatch_routes_by_type_and_reports_unhandled() {
        let visibility = Arc::new(Recorder::default());
        let router = EventRouter::new().on("LowerThirdsVisibilityChanged", visibility.clone());

        assert!(router.dispatch(&Event::from_frame(vendor_frame())).await);
        let scene = Event::from_frame(EventFrame {
            event_type: "CurrentProgramSceneChanged".to_string(),
            event_intent: Some(4),
            event_data: json!({ "sceneName": "Main" }),
        });
        assert!(!router.dispatch(&scene).await);

        assert_eq!(
            *visibility.seen.lock().expect("recorder lock"),
            vec!["LowerThirdsVisibilityChanged".to_string()]
        );
    }

    #[tokio::test]
    async fn fallback_receives_unrouted_events() {
        let fallback = Arc::new(Recorder::default());
        let router = EventRouter::new().fallback(fallback.clone());

        let scene = Event::from_frame(EventFrame {
            event_type: "ExitStarted".to_string(),
            event_intent: Some(1),
            event_data: json!({}),
        });
        assert!(router.dispatch(&scene).await);
        assert_eq!(fallback.seen.lock().expect("recorder lock").len(), 1);
    }
}
