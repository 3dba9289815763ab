use std::collections::VecDeque;
use std::time::Instant;

use desk_logging::{desk_debug, desk_info, desk_warn};
use fluxdesk_core::{
    update, Effect, JobRequest, JobRun, Msg, OutputRef, RunConfig, RunEvent, RunPhase,
};

use crate::engine::GenerationGate;
use crate::extract::extract_outputs;
use crate::materialize::{decode_scaled, PixelBound};
use crate::transport::QueueTransport;

/// Drive one run to a terminal state, then materialize its first output.
///
/// Executes the pure state machine's effects in order on the engine
/// runtime: transport calls and the polling sleep are the suspension
/// points. Every emit goes through the generation gate, so a superseded
/// run falls silent; it also stops issuing new I/O at the next effect.
pub(crate) async fn drive(
    transport: &dyn QueueTransport,
    request: JobRequest,
    config: RunConfig,
    bound: PixelBound,
    gate: &GenerationGate,
) {
    let generation = gate.generation();
    let (mut run, initial) = JobRun::start(generation, request, config);
    let mut queue: VecDeque<Effect> = initial.into();
    let mut outputs: Vec<OutputRef> = Vec::new();

    while let Some(effect) = queue.pop_front() {
        if !gate.is_current() {
            desk_debug!("run {} superseded, abandoning", generation);
            return;
        }
        let msg = match effect {
            Effect::Emit(event) => {
                if let RunEvent::Succeeded { outputs: found } = &event {
                    outputs = found.clone();
                }
                gate.emit_run(event);
                continue;
            }
            Effect::Submit => match transport.submit(run.request()).await {
                Ok(handle) => Msg::SubmitSucceeded {
                    request_id: handle.request_id,
                    now: handle.started,
                },
                Err(err) => Msg::SubmitFailed { error: err.into() },
            },
            Effect::SchedulePoll { delay } => {
                tokio::time::sleep(delay).await;
                Msg::PollDue {
                    now: Instant::now(),
                }
            }
            Effect::PollStatus => {
                let Some(handle) = run.handle().cloned() else {
                    continue;
                };
                match transport.poll_status(&handle).await {
                    Ok(snapshot) => Msg::StatusArrived { snapshot },
                    Err(err) => Msg::PollFailed { error: err.into() },
                }
            }
            Effect::FetchResult => {
                let Some(handle) = run.handle().cloned() else {
                    continue;
                };
                match transport.fetch_result(&handle).await {
                    Ok(doc) => Msg::FetchSucceeded {
                        outputs: extract_outputs(&doc),
                    },
                    Err(err) => Msg::FetchFailed { error: err.into() },
                }
            }
        };

        let (next, effects) = update(run, msg);
        run = next;
        queue.extend(effects);
    }

    match run.phase() {
        RunPhase::Succeeded => {
            desk_info!(
                "run {} succeeded with {} output(s)",
                generation,
                outputs.len()
            );
        }
        phase => {
            desk_warn!("run {} ended in {:?}", generation, phase);
            return;
        }
    }

    // Materialize the first output only; the rest stay data.
    let Some(first) = outputs.first() else {
        return;
    };
    let result = match transport.download(&first.url).await {
        Ok(bytes) => decode_scaled(&bytes, bound).map_err(Into::into),
        Err(err) => Err(err.into()),
    };
    if let Err(err) = &result {
        desk_warn!("run {} image materialization failed: {}", generation, err);
    }
    gate.emit_image(result);
}
