//! Orchestration of a video analysis: resolve the video, probe the backend,
//! analyze, and expose the resulting UI state.

pub mod controller;
pub mod machine;
pub mod state;

pub use controller::Controller;
pub use machine::{Applied, PipelineMachine, Step, StepOutcome, BACKEND_UNREACHABLE};
pub use state::{BackendIndicator, LoadingStage, PipelineRun, RunId, UiState};
