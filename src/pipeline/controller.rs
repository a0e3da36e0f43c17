//! Async driver for the [`PipelineMachine`]
//!
//! The controller is a single task that owns the machine. User commands and
//! step completions arrive as messages and are applied one at a time, so the
//! current [`UiState`] and the active run are only ever written from that
//! task. Every state change is published on a `watch` channel for renderers.

use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::machine::{Applied, PipelineMachine, Step, StepOutcome};
use super::state::{BackendIndicator, PipelineRun, RunId, UiState};
use crate::backend::{Backend, HealthStatus};
use crate::router::{ContextKind, Delivery, MessageRouter, Request, Response};
use crate::video::VideoReference;

enum Command {
    Start(oneshot::Sender<RunId>),
    Retry(oneshot::Sender<Option<RunId>>),
    Reanalyze(oneshot::Sender<Option<RunId>>),
    CheckBackend(oneshot::Sender<BackendIndicator>),
}

/// Work finished outside the controller task
enum Completion {
    Step(RunId, StepOutcome),
    Health(HealthStatus, oneshot::Sender<BackendIndicator>),
}

/// Everything a step needs to run outside the controller task
#[derive(Clone)]
struct StepRunner {
    router: MessageRouter,
    backend: Arc<dyn Backend>,
}

impl StepRunner {
    async fn run(&self, step: Step) -> (RunId, StepOutcome) {
        match step {
            Step::ResolveVideo { run } => (run, StepOutcome::VideoResolved(self.resolve_video().await)),
            Step::ProbeBackend { run } => (run, StepOutcome::Probed(self.backend.probe_health().await)),
            Step::Analyze { run, video } => (run, StepOutcome::Analyzed(self.backend.analyze(&video).await)),
        }
    }

    /// Ask the page for its video; an unreachable page counts as "no video"
    async fn resolve_video(&self) -> Option<VideoReference> {
        match self.router.send(ContextKind::Page, Request::GetVideoId).await {
            Delivery::Reply(Response::VideoId { video_id }) => {
                let raw = video_id?;
                let video = VideoReference::parse(&raw);
                if video.is_none() {
                    warn!("Page reported an invalid video id: {:?}", raw);
                }
                video
            }
            Delivery::Reply(other) => {
                warn!("Unexpected reply to GetVideoId: {:?}", other);
                None
            }
            Delivery::Disconnected(reason) => {
                info!("📭 Page context unavailable: {}", reason);
                None
            }
        }
    }
}

/// Handle to a running pipeline controller
pub struct Controller {
    commands: mpsc::Sender<Command>,
    router: MessageRouter,
    state: watch::Receiver<UiState>,
    indicator: watch::Receiver<BackendIndicator>,
    run: watch::Receiver<Option<PipelineRun>>,
    discarded: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl Controller {
    /// Spawn the controller task
    pub fn spawn(router: MessageRouter, backend: Arc<dyn Backend>) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (state_tx, state_rx) = watch::channel(UiState::Idle);
        let (indicator_tx, indicator_rx) = watch::channel(BackendIndicator::Unknown);
        let (run_tx, run_rx) = watch::channel(None);
        let discarded = Arc::new(AtomicU64::new(0));

        let event_loop = EventLoop {
            machine: PipelineMachine::new(),
            runner: StepRunner {
                router: router.clone(),
                backend,
            },
            state_tx,
            indicator_tx,
            run_tx,
            discarded: Arc::clone(&discarded),
        };
        let task = tokio::spawn(event_loop.run(commands_rx));

        Self {
            commands: commands_tx,
            router,
            state: state_rx,
            indicator: indicator_rx,
            run: run_rx,
            discarded,
            task,
        }
    }

    /// Start a fresh run from video detection
    pub async fn start(&self) -> Result<RunId> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::Start(ack_tx)).await?;
        ack_rx.await.map_err(|_| anyhow!("Controller stopped"))
    }

    /// Re-run probe and analysis after an error; `None` if not in an error state
    pub async fn retry(&self) -> Result<Option<RunId>> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::Retry(ack_tx)).await?;
        ack_rx.await.map_err(|_| anyhow!("Controller stopped"))
    }

    /// Re-run probe and analysis after results; `None` if no results are shown
    pub async fn reanalyze(&self) -> Result<Option<RunId>> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::Reanalyze(ack_tx)).await?;
        ack_rx.await.map_err(|_| anyhow!("Controller stopped"))
    }

    /// Refresh the backend indicator without touching the UI state.
    ///
    /// Independent of any run, so it also works on pages without a video.
    pub async fn check_backend(&self) -> Result<BackendIndicator> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::CheckBackend(ack_tx)).await?;
        ack_rx.await.map_err(|_| anyhow!("Controller stopped"))
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("Controller stopped"))
    }

    /// Liveness check of the background relay
    pub async fn ping_background(&self) -> bool {
        match self.router.send(ContextKind::Background, Request::Ping).await {
            Delivery::Reply(Response::Pong(_)) => true,
            other => {
                debug!("Background ping: {:?}", other);
                false
            }
        }
    }

    /// Current UI state
    pub fn state(&self) -> UiState {
        self.state.borrow().clone()
    }

    /// Subscribe to UI state changes
    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.state.clone()
    }

    pub fn indicator(&self) -> BackendIndicator {
        *self.indicator.borrow()
    }

    pub fn active_run(&self) -> Option<PipelineRun> {
        self.run.borrow().clone()
    }

    /// Number of step outcomes dropped because their run was superseded
    pub fn discarded_outcomes(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Wait until the current run settles and return its terminal state
    pub async fn wait_for_terminal(&self) -> Result<UiState> {
        let mut state = self.state.clone();
        let settled = state
            .wait_for(|state| state.is_terminal())
            .await
            .map_err(|_| anyhow!("Controller stopped"))?;
        Ok((*settled).clone())
    }

    /// Stop the controller task; in-flight steps are abandoned
    pub async fn shutdown(self) {
        drop(self.commands);
        let _ = self.task.await;
    }
}

struct EventLoop {
    machine: PipelineMachine,
    runner: StepRunner,
    state_tx: watch::Sender<UiState>,
    indicator_tx: watch::Sender<BackendIndicator>,
    run_tx: watch::Sender<Option<PipelineRun>>,
    discarded: Arc<AtomicU64>,
}

impl EventLoop {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let (completions_tx, mut completions) = mpsc::unbounded_channel::<Completion>();

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    self.apply_command(command, &completions_tx);
                }
                Some(completion) = completions.recv() => {
                    self.apply_completion(completion, &completions_tx);
                }
            }
        }

        debug!("Controller event loop finished");
    }

    /// Apply a user command; the new state is published before the caller is acknowledged
    fn apply_command(&mut self, command: Command, completions: &mpsc::UnboundedSender<Completion>) {
        let now = Utc::now();
        match command {
            Command::Start(ack) => {
                let step = self.machine.start(now);
                self.publish();
                let _ = ack.send(step.run());
                self.execute(step, completions);
            }
            Command::Retry(ack) => {
                let step = self.machine.retry(now);
                self.publish();
                let _ = ack.send(step.as_ref().map(Step::run));
                if let Some(step) = step {
                    self.execute(step, completions);
                }
            }
            Command::Reanalyze(ack) => {
                let step = self.machine.reanalyze(now);
                self.publish();
                let _ = ack.send(step.as_ref().map(Step::run));
                if let Some(step) = step {
                    self.execute(step, completions);
                }
            }
            Command::CheckBackend(ack) => {
                self.machine.begin_indicator_check();
                self.publish();
                let backend = Arc::clone(&self.runner.backend);
                let completions = completions.clone();
                tokio::spawn(async move {
                    let status = backend.probe_health().await;
                    let _ = completions.send(Completion::Health(status, ack));
                });
            }
        }
    }

    fn apply_completion(&mut self, completion: Completion, completions: &mpsc::UnboundedSender<Completion>) {
        match completion {
            Completion::Step(run, outcome) => {
                match self.machine.complete(run, outcome) {
                    Applied::Next(step) => self.execute(step, completions),
                    Applied::Settled => {}
                    Applied::Discarded => {
                        self.discarded.fetch_add(1, Ordering::Relaxed);
                    }
                }
                self.publish();
            }
            Completion::Health(status, ack) => {
                let indicator = self.machine.record_health(status);
                self.publish();
                let _ = ack.send(indicator);
            }
        }
    }

    fn publish(&self) {
        let state = self.machine.state();
        self.state_tx.send_if_modified(|current| {
            if current != state {
                *current = state.clone();
                true
            } else {
                false
            }
        });
        self.indicator_tx.send_if_modified(|current| {
            let changed = *current != self.machine.indicator();
            *current = self.machine.indicator();
            changed
        });
        self.run_tx.send_replace(self.machine.active_run().cloned());
    }

    fn execute(&self, step: Step, completions: &mpsc::UnboundedSender<Completion>) {
        debug!("Executing {:?}", step);
        let runner = self.runner.clone();
        let completions = completions.clone();
        tokio::spawn(async move {
            let (run, outcome) = runner.run(step).await;
            // The controller may already be gone
            let _ = completions.send(Completion::Step(run, outcome));
        });
    }
}
