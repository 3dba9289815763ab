use std::time::Duration;

use crate::RunEvent;

/// Side effects requested by the state machine, executed by the engine in
/// order. `Emit` interleaves with the I/O effects so consumer events are
/// delivered in transition order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// POST the request to the queue.
    Submit,
    /// Sleep for `delay`, then deliver `Msg::PollDue`.
    SchedulePoll { delay: Duration },
    /// GET the status endpoint.
    PollStatus,
    /// GET the result document.
    FetchResult,
    /// Deliver a consumer-visible event.
    Emit(RunEvent),
}
