use crate::{RunEvent, StatusSnapshot};

/// Render one status snapshot for the status line, omitting absent fields.
/// No placeholders: a snapshot with only a status renders just `Status: X`.
pub fn status_line(snapshot: &StatusSnapshot) -> String {
    let mut parts = vec![format!("Status: {}", snapshot.status.as_str())];
    if let Some(pct) = snapshot.progress_pct {
        parts.push(format!("{pct:.1}%"));
    }
    // eta_ms and queue_position can legitimately be zero.
    if let Some(eta_ms) = snapshot.eta_ms {
        parts.push(format!("ETA: {:.1}s", eta_ms / 1000.0));
    }
    if let Some(pos) = snapshot.queue_position {
        parts.push(format!("Queue: {pos}"));
    }
    parts.join(" | ")
}

/// One display line per run event, for status bars and console frontends.
pub fn event_line(event: &RunEvent) -> String {
    match event {
        RunEvent::Submitting { model_id } => format!("Submitting to {model_id}..."),
        RunEvent::Submitted { request_id } => {
            let short: String = request_id.chars().take(8).collect();
            format!("Submitted (ID: {short}...). Polling...")
        }
        RunEvent::Polling { snapshot } => status_line(snapshot),
        RunEvent::Fetching => "Fetching final result...".to_string(),
        RunEvent::Succeeded { outputs } if outputs.is_empty() => {
            "Completed, but no image URLs found in result.".to_string()
        }
        RunEvent::Succeeded { outputs } => {
            format!("Success! {} image(s) ready.", outputs.len())
        }
        RunEvent::Failed { error } => format!("Failed: {error}"),
        RunEvent::TimedOut { budget } => {
            format!("Operation timed out after {}s.", budget.as_secs())
        }
    }
}
