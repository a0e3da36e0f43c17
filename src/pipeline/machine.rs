/// Pure pipeline state machine
///
/// Holds the current [`UiState`] and the active [`PipelineRun`]. It never
/// performs I/O: every transition returns the next [`Step`] for the driver to
/// execute, and the driver feeds the step's outcome back through
/// [`PipelineMachine::complete`] tagged with the run it belongs to.
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::state::{BackendIndicator, LoadingStage, PipelineRun, RunId, UiState};
use crate::backend::{AnalysisResult, BackendError, HealthStatus};
use crate::video::VideoReference;

/// Error shown when the health probe fails
pub const BACKEND_UNREACHABLE: &str = "backend unreachable";

/// Work the driver must perform next for a run
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    ResolveVideo { run: RunId },
    ProbeBackend { run: RunId },
    Analyze { run: RunId, video: VideoReference },
}

impl Step {
    pub fn run(&self) -> RunId {
        match self {
            Step::ResolveVideo { run } | Step::ProbeBackend { run } | Step::Analyze { run, .. } => *run,
        }
    }
}

/// Result of executing a [`Step`]
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// `None` covers both "not a video page" and "page context unreachable"
    VideoResolved(Option<VideoReference>),
    Probed(HealthStatus),
    Analyzed(Result<AnalysisResult, BackendError>),
}

/// What [`PipelineMachine::complete`] did with an outcome
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Accepted; the run continues with this step
    Next(Step),
    /// Accepted; the run reached a terminal state
    Settled,
    /// Ignored: superseded run, or an outcome the current stage does not expect
    Discarded,
}

#[derive(Debug, Default)]
pub struct PipelineMachine {
    state: UiState,
    run: Option<PipelineRun>,
    indicator: BackendIndicator,
    runs_started: u64,
}

impl PipelineMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn active_run(&self) -> Option<&PipelineRun> {
        self.run.as_ref()
    }

    pub fn indicator(&self) -> BackendIndicator {
        self.indicator
    }

    /// A reachability check outside any run is starting
    pub fn begin_indicator_check(&mut self) {
        self.indicator = BackendIndicator::Checking;
    }

    /// Record the result of a reachability check made outside any run.
    ///
    /// Only the indicator changes; the UI state and the active run are untouched.
    pub fn record_health(&mut self, status: HealthStatus) -> BackendIndicator {
        self.indicator = indicator_for(status);
        self.indicator
    }

    fn begin_run(&mut self, video: Option<VideoReference>, now: DateTime<Utc>) -> RunId {
        self.runs_started += 1;
        let id = RunId::new(self.runs_started);
        if let Some(previous) = &self.run {
            debug!("{} supersedes {}", id, previous.id);
        }
        self.run = Some(PipelineRun {
            id,
            video,
            started_at: now,
        });
        id
    }

    /// Fresh activation: resolve the video again from the page.
    ///
    /// Accepted in any state; whatever was in flight is superseded.
    pub fn start(&mut self, now: DateTime<Utc>) -> Step {
        let run = self.begin_run(None, now);
        self.state = UiState::loading(LoadingStage::ResolvingVideo);
        info!("▶️ Starting {}", run);
        Step::ResolveVideo { run }
    }

    /// Re-enter at the probe step after an error
    pub fn retry(&mut self, now: DateTime<Utc>) -> Option<Step> {
        if !matches!(self.state, UiState::Error { .. }) {
            debug!("Retry ignored in state {:?}", self.state);
            return None;
        }
        self.reenter(now)
    }

    /// Re-enter at the probe step after results were shown
    pub fn reanalyze(&mut self, now: DateTime<Utc>) -> Option<Step> {
        if !matches!(self.state, UiState::Results { .. }) {
            debug!("Reanalyze ignored in state {:?}", self.state);
            return None;
        }
        self.reenter(now)
    }

    fn reenter(&mut self, now: DateTime<Utc>) -> Option<Step> {
        let video = self.run.as_ref()?.video.clone()?;
        let run = self.begin_run(Some(video), now);
        self.state = UiState::loading(LoadingStage::ProbingBackend);
        self.indicator = BackendIndicator::Checking;
        info!("🔁 Re-entering pipeline as {}", run);
        Some(Step::ProbeBackend { run })
    }

    /// Apply the outcome of a step that belonged to `run`
    pub fn complete(&mut self, run: RunId, outcome: StepOutcome) -> Applied {
        let active = match self.run.as_mut() {
            Some(active) if active.id == run => active,
            Some(active) => {
                warn!("Discarding late outcome of {} (active: {})", run, active.id);
                return Applied::Discarded;
            }
            None => {
                warn!("Discarding outcome of {} with no active run", run);
                return Applied::Discarded;
            }
        };

        let stage = match self.state {
            UiState::Loading { stage } => stage,
            _ => {
                warn!("Discarding outcome of {}: run already settled", run);
                return Applied::Discarded;
            }
        };

        match (stage, outcome) {
            (LoadingStage::ResolvingVideo, StepOutcome::VideoResolved(Some(video))) => {
                info!("🎬 {} resolved video {}", run, video);
                active.video = Some(video);
                self.state = UiState::loading(LoadingStage::ProbingBackend);
                self.indicator = BackendIndicator::Checking;
                Applied::Next(Step::ProbeBackend { run })
            }
            (LoadingStage::ResolvingVideo, StepOutcome::VideoResolved(None)) => {
                info!("🚫 {}: no video on this page", run);
                self.state = UiState::NotApplicable;
                Applied::Settled
            }
            (LoadingStage::ProbingBackend, StepOutcome::Probed(HealthStatus::Reachable)) => {
                self.indicator = BackendIndicator::Online;
                match active.video.clone() {
                    Some(video) => {
                        self.state = UiState::loading(LoadingStage::Analyzing);
                        Applied::Next(Step::Analyze { run, video })
                    }
                    None => {
                        self.state = UiState::error("no video resolved");
                        Applied::Settled
                    }
                }
            }
            (LoadingStage::ProbingBackend, StepOutcome::Probed(HealthStatus::Unreachable)) => {
                warn!("❌ {}: {}", run, BACKEND_UNREACHABLE);
                self.indicator = BackendIndicator::Offline;
                self.state = UiState::error(BACKEND_UNREACHABLE);
                Applied::Settled
            }
            (LoadingStage::Analyzing, StepOutcome::Analyzed(Ok(result))) => {
                info!("✅ {}: {} comments analyzed", run, result.total_comments);
                self.state = UiState::Results { result };
                Applied::Settled
            }
            (LoadingStage::Analyzing, StepOutcome::Analyzed(Err(error))) => {
                warn!("❌ {}: analysis failed: {}", run, error);
                self.state = UiState::error(error.message());
                Applied::Settled
            }
            (stage, outcome) => {
                warn!("Discarding {:?} for {} in stage {:?}", outcome, run, stage);
                Applied::Discarded
            }
        }
    }
}

fn indicator_for(status: HealthStatus) -> BackendIndicator {
    match status {
        HealthStatus::Reachable => BackendIndicator::Online,
        HealthStatus::Unreachable => BackendIndicator::Offline,
    }
}
