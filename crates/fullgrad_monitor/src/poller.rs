//! The step polling loop.

use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, Instant};

use fullgrad_core::{Mode, Step};
use fullgrad_store::TensorStore;

use crate::cancel::CancelToken;
use crate::config::PollConfig;
use crate::error::{MonitorError, Result};

/// Hook called by [`StepPoller`] for every newly listed step.
///
/// Returning an error for which [`MonitorError::is_step_unavailable`] holds
/// skips the step until the next poll; any other error ends the run.
pub trait StepHandler<S: TensorStore> {
    /// Handle one step.
    fn handle_step(&mut self, store: &S, step: Step, mode: Mode) -> Result<()>;
}

impl<S, F> StepHandler<S> for F
where
    S: TensorStore,
    F: FnMut(&S, Step, Mode) -> Result<()>,
{
    fn handle_step(&mut self, store: &S, step: Step, mode: Mode) -> Result<()> {
        self(store, step, mode)
    }
}

/// Lifecycle of a polling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No step has been listed yet.
    WaitingForFirstStep,
    /// Steps are arriving.
    Polling,
    /// The job ended and every listed step was handled or skipped.
    Done,
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WaitingForFirstStep => "waiting for first step",
            Self::Polling => "polling",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    /// Steps handled successfully, each exactly once.
    pub rendered: BTreeSet<Step>,
    /// Steps whose tensors never became available before the job ended.
    pub skipped: BTreeSet<Step>,
    /// Number of polls performed.
    pub polls: usize,
    /// State the loop ended in.
    pub final_state: PollState,
}

/// Polls a [`TensorStore`] and hands every new step to a [`StepHandler`].
///
/// Each poll reads the end-of-job flag before listing steps, so a step
/// recorded just before the job ended is still seen by the final poll.
#[derive(Debug, Clone, Default)]
pub struct StepPoller {
    config: PollConfig,
    cancel: CancelToken,
}

impl StepPoller {
    /// Create a poller.
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Stop when `token` is cancelled.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// A token that cancels this poller.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The polling configuration.
    #[must_use]
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll until the job ends, the timeout passes or the run is cancelled.
    pub fn run<S, H>(&self, store: &S, handler: &mut H) -> Result<PollReport>
    where
        S: TensorStore,
        H: StepHandler<S>,
    {
        let mode = self.config.mode;
        let started = Instant::now();
        let mut state = PollState::WaitingForFirstStep;
        let mut rendered = BTreeSet::new();
        let mut polls = 0;

        tracing::info!("Watching {} steps every {:?}", mode, self.config.interval);

        loop {
            self.check_continue(started)?;
            polls += 1;

            let job_ended = store.loaded_all_steps();
            let steps = store.steps(mode)?;

            if state == PollState::WaitingForFirstStep && !steps.is_empty() {
                state = PollState::Polling;
                tracing::info!("First step {} listed, state: {}", steps[0], state);
            }

            let mut unavailable = BTreeSet::new();
            for step in steps {
                if rendered.contains(&step) {
                    continue;
                }
                self.check_continue(started)?;

                match handler.handle_step(store, step, mode) {
                    Ok(()) => {
                        tracing::info!("Rendered step {}", step);
                        rendered.insert(step);
                    }
                    Err(err) if err.is_step_unavailable() => {
                        tracing::warn!("Skipping step {} for now: {}", step, err);
                        unavailable.insert(step);
                    }
                    Err(err) => return Err(err),
                }
            }

            if job_ended {
                state = PollState::Done;
                for step in &unavailable {
                    tracing::warn!("Step {} was never fully recorded", step);
                }
                tracing::info!(
                    "Job ended after {} polls: {} rendered, {} skipped",
                    polls,
                    rendered.len(),
                    unavailable.len()
                );
                return Ok(PollReport {
                    rendered,
                    skipped: unavailable,
                    polls,
                    final_state: state,
                });
            }

            tracing::debug!("Poll {} finished, state: {}", polls, state);
            self.sleep(started);
        }
    }

    fn check_continue(&self, started: Instant) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(MonitorError::Cancelled);
        }
        match self.config.timeout {
            Some(timeout) if started.elapsed() >= timeout => Err(MonitorError::Timeout(timeout)),
            _ => Ok(()),
        }
    }

    /// Sleep one interval, cut short by the timeout.
    fn sleep(&self, started: Instant) {
        let remaining = self
            .config
            .timeout
            .map_or(self.config.interval, |t| t.saturating_sub(started.elapsed()));
        std::thread::sleep(self.config.interval.min(remaining).max(Duration::from_millis(1)));
    }
}
