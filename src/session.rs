/// A popup session: the three contexts wired together
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::backend::{Backend, HttpBackendClient};
use crate::config::Config;
use crate::pipeline::Controller;
use crate::router::{spawn_context, BackgroundContext, ContextEndpoint, ContextKind, MessageRouter, PageContext};

/// Page and background contexts plus the controller driving the UI state
pub struct PopupSession {
    router: MessageRouter,
    page: PageContext,
    endpoints: Vec<ContextEndpoint>,
    controller: Controller,
}

impl PopupSession {
    /// Open a session against the configured HTTP backend
    pub async fn open(config: &Config, page: PageContext) -> Result<Self> {
        config.validate()?;
        let backend = HttpBackendClient::new(&config.backend)?;
        info!("🔗 Analysis backend: {}", backend.base_url());
        Ok(Self::with_backend(config, page, Arc::new(backend)).await)
    }

    /// Open a session against any backend implementation
    pub async fn with_backend(config: &Config, page: PageContext, backend: Arc<dyn Backend>) -> Self {
        let router = MessageRouter::new(&config.router);
        let capacity = config.router.channel_capacity;

        let page_endpoint = spawn_context(ContextKind::Page, page.clone(), capacity);
        let background_endpoint = spawn_context(ContextKind::Background, BackgroundContext, capacity);
        router.register(ContextKind::Page, &page_endpoint).await;
        router.register(ContextKind::Background, &background_endpoint).await;

        let controller = Controller::spawn(router.clone(), backend);

        Self {
            router,
            page,
            endpoints: vec![page_endpoint, background_endpoint],
            controller,
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Stop the controller and every context
    pub async fn close(self) {
        self.controller.shutdown().await;
        for endpoint in self.endpoints {
            endpoint.shutdown().await;
        }
    }
}
