use crate::{Effect, JobHandle, JobRun, JobStatus, Msg, RunError, RunEvent, RunPhase};

/// Pure update function: applies a message to the run and returns any
/// effects, in the order they must execute.
///
/// Messages arriving in a terminal phase are ignored; a late transport
/// callback for a finished run must not resurrect it.
pub fn update(mut run: JobRun, msg: Msg) -> (JobRun, Vec<Effect>) {
    if run.phase().is_terminal() {
        return (run, Vec::new());
    }

    let effects = match (run.phase(), msg) {
        (RunPhase::Submitting, Msg::SubmitSucceeded { request_id, now }) => {
            let handle = JobHandle {
                request_id: request_id.clone(),
                model_id: run.request().model_id.clone(),
                started: now,
            };
            let deadline = now + run.config().poll_budget;
            run.set_handle(handle, deadline);
            run.set_phase(RunPhase::Polling);
            vec![
                Effect::Emit(RunEvent::Submitted { request_id }),
                Effect::SchedulePoll {
                    delay: run.config().poll_interval,
                },
            ]
        }
        (RunPhase::Submitting, Msg::SubmitFailed { error }) => fail(&mut run, error),
        (RunPhase::Polling, Msg::PollDue { now }) => {
            // Deadline check happens before each poll, so elapsed time in
            // Polling never exceeds the budget by more than one interval.
            let expired = run.deadline().is_some_and(|deadline| now > deadline);
            if expired {
                run.set_phase(RunPhase::TimedOut);
                vec![Effect::Emit(RunEvent::TimedOut {
                    budget: run.config().poll_budget,
                })]
            } else {
                vec![Effect::PollStatus]
            }
        }
        (RunPhase::Polling, Msg::StatusArrived { snapshot }) => match snapshot.status {
            JobStatus::Completed => {
                run.set_phase(RunPhase::Fetching);
                vec![
                    Effect::Emit(RunEvent::Polling { snapshot }),
                    Effect::Emit(RunEvent::Fetching),
                    Effect::FetchResult,
                ]
            }
            JobStatus::Failed => {
                let detail = snapshot
                    .error
                    .as_ref()
                    .map(|detail| detail.combined())
                    .unwrap_or_else(|| "Unknown error during processing.".to_string());
                fail(&mut run, RunError::JobFailed(detail))
            }
            JobStatus::Queued | JobStatus::InProgress | JobStatus::Unknown => {
                vec![
                    Effect::Emit(RunEvent::Polling { snapshot }),
                    Effect::SchedulePoll {
                        delay: run.config().poll_interval,
                    },
                ]
            }
        },
        (RunPhase::Polling, Msg::PollFailed { error }) => fail(&mut run, error),
        (RunPhase::Fetching, Msg::FetchSucceeded { outputs }) => {
            run.set_phase(RunPhase::Succeeded);
            vec![Effect::Emit(RunEvent::Succeeded { outputs })]
        }
        (RunPhase::Fetching, Msg::FetchFailed { error }) => fail(&mut run, error),
        // A message that does not belong to the current phase is stale.
        _ => Vec::new(),
    };

    (run, effects)
}

fn fail(run: &mut JobRun, error: RunError) -> Vec<Effect> {
    run.set_phase(RunPhase::Failed);
    vec![Effect::Emit(RunEvent::Failed { error })]
}
