use std::time::Duration;

use crate::{OutputRef, RunError, StatusSnapshot};

/// Consumer-visible progress events, exactly one per meaningful transition.
///
/// Terminal variants (`Succeeded`, `Failed`, `TimedOut`) are emitted exactly
/// once per run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Submitting { model_id: String },
    Submitted { request_id: String },
    Polling { snapshot: StatusSnapshot },
    Fetching,
    /// Success. `outputs` may be empty: a completed job with no usable
    /// images is a success outcome, not an error.
    Succeeded { outputs: Vec<OutputRef> },
    Failed { error: RunError },
    TimedOut { budget: Duration },
}

impl RunEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunEvent::Succeeded { .. } | RunEvent::Failed { .. } | RunEvent::TimedOut { .. }
        )
    }
}
