//! Analysis backend access
//!
//! The backend scores comments; this side only probes it and asks for one
//! analysis at a time. Neither operation retries.

pub mod client;
pub mod models;

pub use client::HttpBackendClient;
pub use models::{AnalysisPayload, AnalysisRequest, AnalysisResult, SentimentLabel, Verdict};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::video::VideoReference;

/// Outcome of a reachability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Reachable,
    Unreachable,
}

impl HealthStatus {
    pub fn is_reachable(&self) -> bool {
        matches!(self, HealthStatus::Reachable)
    }
}

/// Failure of an analysis request
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The backend answered with a non-success status
    #[error("{message}")]
    Status { status: u16, message: String },

    /// Success status, but the body is not a usable analysis
    #[error("{message}")]
    InvalidPayload { status: u16, message: String },

    /// No response was received at all
    #[error("{message}")]
    Transport { message: String },
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } | BackendError::InvalidPayload { status, .. } => Some(*status),
            BackendError::Transport { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            BackendError::Status { message, .. }
            | BackendError::InvalidPayload { message, .. }
            | BackendError::Transport { message } => message,
        }
    }
}

/// Trait for analysis backends
#[async_trait]
pub trait Backend: Send + Sync {
    /// Bounded-time reachability check
    async fn probe_health(&self) -> HealthStatus;

    /// One analysis request for the given video
    async fn analyze(&self, video: &VideoReference) -> Result<AnalysisResult, BackendError>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn probe_health(&self) -> HealthStatus {
        (**self).probe_health().await
    }

    async fn analyze(&self, video: &VideoReference) -> Result<AnalysisResult, BackendError> {
        (**self).analyze(video).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_accessors() {
        let error = BackendError::Status {
            status: 500,
            message: "model unavailable".to_string(),
        };
        assert_eq!(error.status(), Some(500));
        assert_eq!(error.message(), "model unavailable");
        assert_eq!(error.to_string(), "model unavailable");

        let error = BackendError::Transport {
            message: "Transport failure: connection refused".to_string(),
        };
        assert_eq!(error.status(), None);
        assert!(error.message().contains("connection refused"));
    }

    #[test]
    fn test_health_status() {
        assert!(HealthStatus::Reachable.is_reachable());
        assert!(!HealthStatus::Unreachable.is_reachable());
    }
}
