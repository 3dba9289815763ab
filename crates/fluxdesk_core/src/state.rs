use std::time::{Duration, Instant};

use crate::{Effect, JobRequest, RunEvent};

/// Monotonic token identifying one run. A new `start()` bumps the current
/// generation; events carrying a stale generation must be dropped.
pub type Generation = u64;

/// Lifecycle of exactly one job. The three right-hand states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Submitting,
    Polling,
    Fetching,
    Succeeded,
    Failed,
    TimedOut,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunPhase::Succeeded | RunPhase::Failed | RunPhase::TimedOut
        )
    }
}

/// Server-issued identity of a submitted job plus the data needed to derive
/// its status/result URLs and account for the polling deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub request_id: String,
    pub model_id: String,
    pub started: Instant,
}

/// Fixed polling cadence and wall-clock budget for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    pub poll_interval: Duration,
    pub poll_budget: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            poll_budget: Duration::from_secs(300),
        }
    }
}

/// State of one orchestration run. Owned by the driver; at most one instance
/// is live at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRun {
    generation: Generation,
    request: JobRequest,
    config: RunConfig,
    phase: RunPhase,
    handle: Option<JobHandle>,
    deadline: Option<Instant>,
}

impl JobRun {
    /// Begin a run: enters `Submitting` and asks the executor to submit.
    pub fn start(
        generation: Generation,
        request: JobRequest,
        config: RunConfig,
    ) -> (Self, Vec<Effect>) {
        let effects = vec![
            Effect::Emit(RunEvent::Submitting {
                model_id: request.model_id.clone(),
            }),
            Effect::Submit,
        ];
        let run = Self {
            generation,
            request,
            config,
            phase: RunPhase::Submitting,
            handle: None,
            deadline: None,
        };
        (run, effects)
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn request(&self) -> &JobRequest {
        &self.request
    }

    pub fn config(&self) -> RunConfig {
        self.config
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn handle(&self) -> Option<&JobHandle> {
        self.handle.as_ref()
    }

    pub(crate) fn set_phase(&mut self, phase: RunPhase) {
        self.phase = phase;
    }

    pub(crate) fn set_handle(&mut self, handle: JobHandle, deadline: Instant) {
        self.handle = Some(handle);
        self.deadline = Some(deadline);
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
