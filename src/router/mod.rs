//! Cross-context message routing
//!
//! The UI, the hosting page and the background relay are isolated contexts
//! that only talk through typed request/response messages. Every request gets
//! its own reply channel, and every request resolves to exactly one
//! [`Delivery`]: a reply or a disconnection.

pub mod context;

pub use context::{spawn_context, BackgroundContext, ContextEndpoint, ContextHandler, PageContext};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::debug;

use crate::config::RouterConfig;

/// Contexts a message can be addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    /// The video page, which can observe the live page address
    Page,
    /// The persistent background relay
    Background,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKind::Page => f.write_str("page"),
            ContextKind::Background => f.write_str("background"),
        }
    }
}

/// Requests understood by the contexts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    GetVideoId,
    Ping,
}

/// Replies to [`Request`]s
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    // Tried first: a missing `videoId` would otherwise read as `null`
    Pong(PongTag),
    VideoId {
        #[serde(rename = "videoId")]
        video_id: Option<String>,
    },
}

impl Response {
    pub fn video_id(video_id: Option<String>) -> Self {
        Response::VideoId { video_id }
    }

    pub fn pong() -> Self {
        Response::Pong(PongTag::Pong)
    }
}

/// `{"type": "PONG"}` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PongTag {
    Pong,
}

/// Why a request produced no reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Nothing is registered for the target context
    NoListener,
    /// The target context stopped processing messages
    ContextClosed,
    /// The target handled the request but sent nothing back
    NoResponse,
    /// No reply before the router deadline
    TimedOut,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DisconnectReason::NoListener => "no listener",
            DisconnectReason::ContextClosed => "context closed",
            DisconnectReason::NoResponse => "no response",
            DisconnectReason::TimedOut => "timed out",
        };
        f.write_str(text)
    }
}

/// Outcome of a single routed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Reply(Response),
    Disconnected(DisconnectReason),
}

impl Delivery {
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Delivery::Disconnected(_))
    }
}

/// Identity of one routed call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call#{}", self.0)
    }
}

/// A request in flight to a context, with its private reply channel
#[derive(Debug)]
pub struct Envelope {
    pub call_id: CallId,
    pub request: Request,
    pub reply: oneshot::Sender<Response>,
}

/// Routes requests from the UI context to the page and background contexts
#[derive(Debug, Clone)]
pub struct MessageRouter {
    routes: Arc<RwLock<HashMap<ContextKind, mpsc::Sender<Envelope>>>>,
    next_call: Arc<AtomicU64>,
    response_timeout: Duration,
}

impl MessageRouter {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            routes: Arc::new(RwLock::new(HashMap::new())),
            next_call: Arc::new(AtomicU64::new(1)),
            response_timeout: Duration::from_millis(config.response_timeout_ms),
        }
    }

    /// Register (or replace) the endpoint serving a context
    pub async fn register(&self, kind: ContextKind, endpoint: &ContextEndpoint) {
        self.routes.write().await.insert(kind, endpoint.sender());
        debug!("Router: registered {} context", kind);
    }

    /// Remove a context; later requests to it resolve as `NoListener`
    pub async fn unregister(&self, kind: ContextKind) {
        self.routes.write().await.remove(&kind);
        debug!("Router: unregistered {} context", kind);
    }

    /// Send a request and wait for its reply or a disconnection.
    ///
    /// Never retries and never waits longer than the configured deadline.
    pub async fn send(&self, target: ContextKind, request: Request) -> Delivery {
        let call_id = CallId(self.next_call.fetch_add(1, Ordering::Relaxed));

        let sender = match self.routes.read().await.get(&target) {
            Some(sender) => sender.clone(),
            None => {
                debug!("Router: {} to {} has no listener ({:?})", call_id, target, request);
                return Delivery::Disconnected(DisconnectReason::NoListener);
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            call_id,
            request,
            reply: reply_tx,
        };

        let delivery = match tokio::time::timeout(self.response_timeout, async {
            if sender.send(envelope).await.is_err() {
                return Delivery::Disconnected(DisconnectReason::ContextClosed);
            }
            match reply_rx.await {
                Ok(response) => Delivery::Reply(response),
                Err(_) => Delivery::Disconnected(DisconnectReason::NoResponse),
            }
        })
        .await
        {
            Ok(delivery) => delivery,
            Err(_) => Delivery::Disconnected(DisconnectReason::TimedOut),
        };

        debug!("Router: {} to {} -> {:?}", call_id, target, delivery);
        delivery
    }
}
