use std::time::Duration;

/// Terminal failure taxonomy for one job run.
///
/// `PollingTimeout` is deliberately distinct from `JobFailed` so the caller
/// can offer "try again" messaging for the former.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunError {
    /// Bad or missing credential. User-correctable, never retried.
    #[error("API key invalid or unauthorized")]
    Auth,
    /// Server rejected the request; surfaced verbatim, not retried.
    #[error("API error ({status}): {detail}")]
    Api { status: u16, detail: String },
    /// Connectivity or timeout on a single call.
    #[error("network error: {0}")]
    Network(String),
    /// Response was not valid JSON or lacked a required field.
    #[error("unexpected server response: {0}")]
    Protocol(String),
    /// Server reported FAILED; message includes concatenated log text when
    /// available.
    #[error("job failed: {0}")]
    JobFailed(String),
    /// Wall-clock polling budget exceeded.
    #[error("polling timed out after {}s", budget.as_secs())]
    PollingTimeout { budget: Duration },
}
