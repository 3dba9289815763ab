/// Server-reported job status, parsed from the loosely-typed wire string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    /// Anything the server sends that we do not recognize. Treated like
    /// `Queued`/`InProgress`: keep polling.
    Unknown,
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "QUEUED" | "IN_QUEUE" => JobStatus::Queued,
            "IN_PROGRESS" => JobStatus::InProgress,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" => JobStatus::Failed,
            _ => JobStatus::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Error payload attached to a FAILED status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub message: String,
    pub log_lines: Vec<String>,
}

impl ErrorDetail {
    /// Server message concatenated with any log lines, the way the failure
    /// is surfaced to the consumer.
    pub fn combined(&self) -> String {
        if self.log_lines.is_empty() {
            self.message.clone()
        } else {
            format!("{}\n\nLogs:\n{}", self.message, self.log_lines.join("\n"))
        }
    }
}

/// Ephemeral result of one status poll. Not retained between polls except
/// for display.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub status: JobStatus,
    pub progress_pct: Option<f64>,
    pub eta_ms: Option<f64>,
    pub queue_position: Option<u64>,
    pub error: Option<ErrorDetail>,
}

impl StatusSnapshot {
    /// Snapshot with just a status and no optional fields.
    pub fn of(status: JobStatus) -> Self {
        Self {
            status,
            progress_pct: None,
            eta_ms: None,
            queue_position: None,
            error: None,
        }
    }
}
