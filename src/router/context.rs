/// Context endpoints: the page and background sides of the router
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{ContextKind, Envelope, Request, Response};
use crate::video::locate_video;

/// Behaviour of a context for the requests it receives.
///
/// Returning `None` leaves the request unanswered; the caller then observes
/// a disconnection instead of waiting forever.
#[async_trait]
pub trait ContextHandler: Send + Sync + 'static {
    async fn handle(&self, request: Request) -> Option<Response>;
}

/// Running context: the inbox sender plus the task draining it
#[derive(Debug)]
pub struct ContextEndpoint {
    kind: ContextKind,
    sender: mpsc::Sender<Envelope>,
    task: JoinHandle<()>,
}

impl ContextEndpoint {
    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<Envelope> {
        self.sender.clone()
    }

    /// Tear the context down; in-flight and later requests see it as closed
    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
        info!("🛑 {} context stopped", self.kind);
    }
}

/// Spawn a context that processes one request at a time
pub fn spawn_context<H: ContextHandler>(kind: ContextKind, handler: H, capacity: usize) -> ContextEndpoint {
    let (sender, mut inbox) = mpsc::channel::<Envelope>(capacity.max(1));

    let task = tokio::spawn(async move {
        while let Some(envelope) = inbox.recv().await {
            let Envelope { call_id, request, reply } = envelope;
            debug!("{} context handling {} ({:?})", kind, call_id, request);

            match handler.handle(request).await {
                Some(response) => {
                    // The caller may have timed out and gone away
                    if reply.send(response).is_err() {
                        debug!("{} context: caller of {} is gone", kind, call_id);
                    }
                }
                None => drop(reply),
            }
        }
        debug!("{} context inbox closed", kind);
    });

    ContextEndpoint { kind, sender, task }
}

/// The hosting page: the only context that sees the live page address
#[derive(Debug, Clone)]
pub struct PageContext {
    address: Arc<RwLock<String>>,
}

impl PageContext {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: Arc::new(RwLock::new(address.into())),
        }
    }

    /// Simulate in-page navigation to another address
    pub async fn navigate(&self, address: impl Into<String>) {
        *self.address.write().await = address.into();
    }

    pub async fn address(&self) -> String {
        self.address.read().await.clone()
    }
}

#[async_trait]
impl ContextHandler for PageContext {
    async fn handle(&self, request: Request) -> Option<Response> {
        match request {
            Request::GetVideoId => {
                let address = self.address.read().await;
                let video_id = locate_video(&address).map(String::from);
                Some(Response::video_id(video_id))
            }
            // Liveness is the background relay's job
            Request::Ping => None,
        }
    }
}

/// The persistent background relay
#[derive(Debug, Clone, Default)]
pub struct BackgroundContext;

#[async_trait]
impl ContextHandler for BackgroundContext {
    async fn handle(&self, request: Request) -> Option<Response> {
        match request {
            Request::Ping => Some(Response::pong()),
            Request::GetVideoId => None,
        }
    }
}
