use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::backend::AnalysisResult;
use crate::video::VideoReference;

/// Identity of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(u64);

impl RunId {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run#{}", self.0)
    }
}

/// One resolve → probe → analyze attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: RunId,
    /// Set once the page reported a video; carried over by retry and reanalyze
    pub video: Option<VideoReference>,
    pub started_at: DateTime<Utc>,
}

/// Loading sub-stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadingStage {
    ResolvingVideo,
    ProbingBackend,
    Analyzing,
}

impl LoadingStage {
    /// Progress message shown while the stage runs
    pub fn message(&self) -> &'static str {
        match self {
            LoadingStage::ResolvingVideo => "Looking for a video on this page…",
            LoadingStage::ProbingBackend => "Checking the analysis backend…",
            LoadingStage::Analyzing => "Analyzing comment sentiment…",
        }
    }
}

/// What the UI shows
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UiState {
    /// Before the first run
    #[default]
    Idle,
    /// The page is not a video page
    NotApplicable,
    Loading { stage: LoadingStage },
    Error { message: String },
    Results { result: AnalysisResult },
}

impl UiState {
    /// States a run ends in
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UiState::NotApplicable | UiState::Error { .. } | UiState::Results { .. }
        )
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, UiState::Loading { .. })
    }

    pub fn loading(stage: LoadingStage) -> Self {
        UiState::Loading { stage }
    }

    pub fn error(message: impl Into<String>) -> Self {
        UiState::Error {
            message: message.into(),
        }
    }
}

/// Backend status dot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendIndicator {
    #[default]
    Unknown,
    Checking,
    Online,
    Offline,
}
