//! YouTube Comment Sentiment Analyzer - client core
//!
//! Detects the video on the current page, asks the analysis backend to score
//! its comments, and exposes the resulting UI state to a renderer.

pub mod video;
pub mod router;
pub mod backend;
pub mod pipeline;
pub mod config;
pub mod render;
pub mod session;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::video::{locate_video, VideoReference};
pub use crate::router::{ContextKind, Delivery, DisconnectReason, MessageRouter, Request, Response};
pub use crate::backend::{AnalysisResult, Backend, BackendError, HealthStatus, HttpBackendClient};
pub use crate::pipeline::{Controller, LoadingStage, PipelineMachine, RunId, UiState};
pub use crate::session::PopupSession;
