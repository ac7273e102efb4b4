//! # Event Bus System
//!
//! Typed, broadcast notifications about engine activity, built on
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: `LifecycleEvent`, `FlowEvent` and `WebviewEvent`
//!   wrapped in [`CoreEvent`]
//! - **EventBus**: central broadcast channel
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! ```text
//! ┌──────────────┐   emit   ┌──────────┐  subscribe  ┌──────────────┐
//! │ RequestEngine├─────────>│ EventBus ├────────────>│ host / tests │
//! └──────────────┘          └──────────┘             └──────────────┘
//! ```
//!
//! Emission is best-effort: with no subscribers `emit` returns an error that
//! the engine ignores.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, FlowEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Flow(FlowEvent::Started {
//!     operation: "github:profile".to_string(),
//!     flow_id: None,
//! }))
//! .ok();
//!
//! assert!(matches!(rx.recv().await, Ok(CoreEvent::Flow(_))));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; non-fatal.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Engine lifecycle transitions
    Lifecycle(LifecycleEvent),
    /// Progress of individual `get` calls
    Flow(FlowEvent),
    /// Problems with ingested webview events
    Webview(WebviewEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Lifecycle(e) => e.description(),
            CoreEvent::Flow(e) => e.description(),
            CoreEvent::Webview(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Lifecycle(LifecycleEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Flow(FlowEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Flow(FlowEvent::TimedOut { .. }) => EventSeverity::Warning,
            CoreEvent::Webview(WebviewEvent::Dropped { .. }) => EventSeverity::Warning,
            CoreEvent::Lifecycle(LifecycleEvent::Ready { .. }) => EventSeverity::Info,
            CoreEvent::Flow(FlowEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Lifecycle Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LifecycleEvent {
    /// `init` accepted the credential and started the transition.
    Initializing { environment: String, dry_run: bool },
    /// The engine accepts requests.
    Ready { environment: String, dry_run: bool },
    /// `init` failed; the engine rejects every request from now on.
    Failed { reason: String },
}

impl LifecycleEvent {
    fn description(&self) -> &str {
        match self {
            LifecycleEvent::Initializing { .. } => "Engine initializing",
            LifecycleEvent::Ready { .. } => "Engine ready",
            LifecycleEvent::Failed { .. } => "Engine initialization failed",
        }
    }
}

// ============================================================================
// Flow Events
// ============================================================================

/// Progress of one `get` call. `flow_id` is present once a browser flow exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum FlowEvent {
    Started {
        operation: String,
        flow_id: Option<String>,
    },
    /// The host was asked to show the browser.
    BrowserPresented { operation: String, flow_id: String },
    /// Cookies were captured from the browser and the flow resumed.
    SessionCaptured {
        operation: String,
        flow_id: String,
        cookie_count: usize,
    },
    Completed {
        operation: String,
        has_proof: bool,
        duration_ms: u64,
    },
    Failed {
        operation: String,
        code: String,
        message: String,
    },
    Cancelled {
        operation: String,
        flow_id: Option<String>,
    },
    /// `flow_id` is absent when no browser surface became free in time.
    TimedOut {
        operation: String,
        flow_id: Option<String>,
    },
}

impl FlowEvent {
    fn description(&self) -> &str {
        match self {
            FlowEvent::Started { .. } => "Flow started",
            FlowEvent::BrowserPresented { .. } => "Browser presented",
            FlowEvent::SessionCaptured { .. } => "Session captured",
            FlowEvent::Completed { .. } => "Flow completed",
            FlowEvent::Failed { .. } => "Flow failed",
            FlowEvent::Cancelled { .. } => "Flow cancelled",
            FlowEvent::TimedOut { .. } => "Flow timed out",
        }
    }
}

// ============================================================================
// Webview Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum WebviewEvent {
    /// An ingested event was malformed or had no flow to go to.
    Dropped { reason: String },
}

impl WebviewEvent {
    fn description(&self) -> &str {
        match self {
            WebviewEvent::Dropped { .. } => "Webview event dropped",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel. Cloning shares the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// `capacity` is the number of events buffered per subscriber before it
    /// starts receiving `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let flows_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Flow(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> CoreEvent {
        CoreEvent::Lifecycle(LifecycleEvent::Ready {
            environment: "sandbox".to_string(),
            dry_run: true,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);

        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(ready()).is_err());
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.emit(ready()).unwrap(), 2);
        assert_eq!(a.recv().await.unwrap(), ready());
        assert_eq!(b.recv().await.unwrap(), ready());
    }

    #[tokio::test]
    async fn test_event_stream_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|e| matches!(e, CoreEvent::Flow(_)));

        bus.emit(ready()).unwrap();
        bus.emit(CoreEvent::Flow(FlowEvent::Cancelled {
            operation: "uber_rider:profile".to_string(),
            flow_id: None,
        }))
        .unwrap();

        let event = stream.recv().await.unwrap();
        assert!(matches!(event, CoreEvent::Flow(FlowEvent::Cancelled { .. })));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for _ in 0..5 {
            bus.emit(ready()).unwrap();
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_severity_and_description() {
        let failed = CoreEvent::Flow(FlowEvent::Failed {
            operation: "reddit:account".to_string(),
            code: "UpstreamFailure".to_string(),
            message: "502".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(failed.description(), "Flow failed");

        let dropped = CoreEvent::Webview(WebviewEvent::Dropped {
            reason: "malformed".to_string(),
        });
        assert_eq!(dropped.severity(), EventSeverity::Warning);
        assert_eq!(ready().severity(), EventSeverity::Info);
    }

    #[test]
    fn test_event_serialization_shape() {
        let json = serde_json::to_value(ready()).unwrap();
        assert_eq!(json["type"], "Lifecycle");
        assert_eq!(json["payload"]["event"], "Ready");
        assert_eq!(json["payload"]["dry_run"], true);

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, ready());
    }
}
