use std::time::Instant;

use crate::{OutputRef, RunError, StatusSnapshot};

/// Outcomes the executor feeds back into the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Submit call returned a request id.
    SubmitSucceeded { request_id: String, now: Instant },
    /// Submit call failed.
    SubmitFailed { error: RunError },
    /// The poll interval elapsed; `now` is checked against the deadline
    /// before another status call is issued.
    PollDue { now: Instant },
    /// A status poll completed.
    StatusArrived { snapshot: StatusSnapshot },
    /// A status poll failed at the transport level.
    PollFailed { error: RunError },
    /// The result document was fetched and its outputs extracted.
    FetchSucceeded { outputs: Vec<OutputRef> },
    /// Result fetch or extraction failed.
    FetchFailed { error: RunError },
}
