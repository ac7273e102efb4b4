//! # Webview Event Routing
//!
//! The host pushes browser events into the engine as JSON strings. Each event
//! is parsed into a [`WebviewEnvelope`] and delivered to the inbox of the flow
//! it belongs to: the flow named by `flow_id`, or the single presented flow
//! when the host did not say. With several flows on screen an event without
//! `flow_id` has no owner and is dropped.
//!
//! Events for flows that already finished and repeated `(event, id)` pairs
//! are ignored.

use bridge_traits::{BrowserCookies, FlowId};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// The event itself, keyed by the `event` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event")]
pub enum WebviewSignal {
    #[serde(rename = "navigation")]
    Navigation {
        url: String,
        #[serde(default)]
        html_body: Option<String>,
        #[serde(default, deserialize_with = "deserialize_cookies")]
        cookies: Option<BrowserCookies>,
        #[serde(default)]
        visited_urls: Vec<String>,
    },
    #[serde(rename = "close")]
    Close,
    #[serde(rename = "window.close")]
    WindowClose,
    #[serde(rename = "intercepted_request")]
    InterceptedRequest { data: Value },
}

impl WebviewSignal {
    pub fn kind(&self) -> &'static str {
        match self {
            WebviewSignal::Navigation { .. } => "navigation",
            WebviewSignal::Close => "close",
            WebviewSignal::WindowClose => "window.close",
            WebviewSignal::InterceptedRequest { .. } => "intercepted_request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebviewEnvelope {
    /// Dedup key. Hosts send strings or numbers.
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub flow_id: Option<FlowId>,
    #[serde(flatten)]
    pub signal: WebviewSignal,
}

impl WebviewEnvelope {
    pub fn parse(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| format!("malformed webview event: {}", e))
    }

    fn dedup_key(&self) -> Option<String> {
        let id = match self.id.as_ref()? {
            Value::String(s) => s.clone(),
            Value::Null => return None,
            other => other.to_string(),
        };
        Some(format!("{}#{}", self.signal.kind(), id))
    }
}

/// Cookies arrive either as a `{name: value}` object or as a `Cookie` header
/// string.
fn deserialize_cookies<'de, D>(deserializer: D) -> Result<Option<BrowserCookies>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Map(BTreeMap<String, Value>),
        Header(String),
    }

    let cookies = match Option::<Raw>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Raw::Map(map)) => BrowserCookies(
            map.into_iter()
                .map(|(name, value)| {
                    let value = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (name, value)
                })
                .collect(),
        ),
        Some(Raw::Header(header)) => BrowserCookies(
            header
                .split(';')
                .filter_map(|pair| pair.trim().split_once('='))
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .filter(|(name, _)| !name.is_empty())
                .collect(),
        ),
    };
    Ok(Some(cookies))
}

/// What happened to a routed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Delivered(FlowId),
    /// Same `(event, id)` already delivered to that flow.
    Duplicate(FlowId),
    /// Addressed to a flow that is no longer waiting.
    Stale(FlowId),
    /// No `flow_id`, and not exactly one flow presented.
    Unroutable,
}

struct FlowSlot {
    sender: mpsc::UnboundedSender<WebviewSignal>,
    seen: HashSet<String>,
}

#[derive(Default)]
struct RouterState {
    slots: HashMap<FlowId, FlowSlot>,
    /// Presentation order. When it holds one flow, that flow receives events
    /// without `flow_id`.
    presented: Vec<FlowId>,
}

/// Delivers webview events to waiting flows.
#[derive(Default)]
pub struct EventRouter {
    state: Mutex<RouterState>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an inbox for `flow`. Events are buffered from here on, so
    /// register before asking the host to present anything.
    pub fn register(self: &Arc<Self>, flow: FlowId) -> FlowInbox {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().slots.insert(
            flow,
            FlowSlot {
                sender,
                seen: HashSet::new(),
            },
        );
        FlowInbox {
            router: Arc::clone(self),
            flow,
            receiver,
        }
    }

    pub fn route(&self, envelope: WebviewEnvelope) -> RouteOutcome {
        let mut state = self.lock();

        let target = match envelope.flow_id {
            Some(flow) => flow,
            None => match state.presented.as_slice() {
                [only] => *only,
                _ => return RouteOutcome::Unroutable,
            },
        };

        let Some(slot) = state.slots.get_mut(&target) else {
            return RouteOutcome::Stale(target);
        };

        if let Some(key) = envelope.dedup_key() {
            if !slot.seen.insert(key) {
                return RouteOutcome::Duplicate(target);
            }
        }

        match slot.sender.send(envelope.signal) {
            Ok(()) => RouteOutcome::Delivered(target),
            Err(_) => RouteOutcome::Stale(target),
        }
    }

    /// Flows currently waiting for events, oldest first.
    pub fn waiting_flows(&self) -> Vec<FlowId> {
        let state = self.lock();
        let mut flows: Vec<FlowId> = state.slots.keys().copied().collect();
        flows.sort_by_key(|flow| {
            state
                .presented
                .iter()
                .position(|p| p == flow)
                .unwrap_or(usize::MAX)
        });
        flows
    }

    fn mark_presented(&self, flow: FlowId) {
        let mut state = self.lock();
        if state.slots.contains_key(&flow) {
            state.presented.retain(|p| *p != flow);
            state.presented.push(flow);
        }
    }

    fn unregister(&self, flow: FlowId) {
        let mut state = self.lock();
        state.slots.remove(&flow);
        state.presented.retain(|p| *p != flow);
    }

    fn lock(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Receiving end for one flow. Dropping it unregisters the flow; later
/// events addressed to it are stale.
pub struct FlowInbox {
    router: Arc<EventRouter>,
    flow: FlowId,
    receiver: mpsc::UnboundedReceiver<WebviewSignal>,
}

impl FlowInbox {
    pub fn flow(&self) -> FlowId {
        self.flow
    }

    /// Mark this flow as on screen; while it is the only one, it receives
    /// events without `flow_id`.
    pub fn mark_presented(&self) {
        self.router.mark_presented(self.flow);
    }

    pub async fn recv(&mut self) -> Option<WebviewSignal> {
        self.receiver.recv().await
    }
}

impl Drop for FlowInbox {
    fn drop(&mut self) {
        self.router.unregister(self.flow);
    }
}
