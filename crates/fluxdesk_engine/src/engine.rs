use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use desk_logging::desk_info;
use fluxdesk_core::{Generation, JobRequest, RunConfig, RunEvent};

use crate::materialize::{DecodedImage, MaterializeError, PixelBound};
use crate::runner;
use crate::transport::{ApiKey, HttpTransport, QueueTransport, TransportError, TransportSettings};

/// Why the first output of a successful run could not be displayed.
/// Reported through the image event, never as a run failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ImageError {
    #[error("could not download image: {0}")]
    Download(#[from] TransportError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

/// Events delivered to the consuming thread. Every event carries the
/// generation of the run it belongs to; events for a superseded generation
/// are dropped at the source, but consumers should re-check before mutating
/// display state.
#[derive(Debug)]
pub enum EngineEvent {
    Run {
        generation: Generation,
        event: RunEvent,
    },
    /// Materialization outcome for the first output of a successful run.
    Image {
        generation: Generation,
        result: Result<DecodedImage, ImageError>,
    },
}

impl EngineEvent {
    pub fn generation(&self) -> Generation {
        match self {
            EngineEvent::Run { generation, .. } | EngineEvent::Image { generation, .. } => {
                *generation
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub transport: TransportSettings,
    pub run: RunConfig,
    pub bound: PixelBound,
}

enum EngineCommand {
    StartJob {
        generation: Generation,
        request: JobRequest,
    },
}

/// Emission gate for one run: events pass through only while the run's
/// generation is still current. Soft cancellation drops stale deliveries
/// instead of aborting in-flight I/O.
pub(crate) struct GenerationGate {
    generation: Generation,
    current: Arc<AtomicU64>,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl GenerationGate {
    pub(crate) fn generation(&self) -> Generation {
        self.generation
    }

    pub(crate) fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    pub(crate) fn emit_run(&self, event: RunEvent) {
        if self.is_current() {
            let _ = self.event_tx.send(EngineEvent::Run {
                generation: self.generation,
                event,
            });
        }
    }

    pub(crate) fn emit_image(&self, result: Result<DecodedImage, ImageError>) {
        if self.is_current() {
            let _ = self.event_tx.send(EngineEvent::Image {
                generation: self.generation,
                result,
            });
        }
    }
}

/// Handle to the engine worker thread. Cheap to clone; commands go in over
/// a channel, events come back over the receiver returned at construction.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    current_generation: Arc<AtomicU64>,
    api_key: ApiKey,
}

impl EngineHandle {
    /// Engine with the production HTTP transport.
    pub fn new(
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>), TransportError> {
        let api_key = ApiKey::default();
        let transport = Arc::new(HttpTransport::new(config.transport.clone(), api_key.clone())?);
        Ok(Self::with_transport(transport, config, api_key))
    }

    /// Engine with a caller-supplied transport. Used by tests.
    pub fn with_transport(
        transport: Arc<dyn QueueTransport>,
        config: EngineConfig,
        api_key: ApiKey,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let current_generation = Arc::new(AtomicU64::new(0));
        let current = current_generation.clone();

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::StartJob {
                        generation,
                        request,
                    } => {
                        let transport = transport.clone();
                        let gate = GenerationGate {
                            generation,
                            current: current.clone(),
                            event_tx: event_tx.clone(),
                        };
                        let run_config = config.run;
                        let bound = config.bound;
                        runtime.spawn(async move {
                            runner::drive(transport.as_ref(), request, run_config, bound, &gate)
                                .await;
                        });
                    }
                }
            }
        });

        (
            Self {
                cmd_tx,
                current_generation,
                api_key,
            },
            event_rx,
        )
    }

    /// Begin a new run, superseding any run still in flight. The superseded
    /// run's eventual callbacks are silenced, not aborted.
    pub fn start(&self, request: JobRequest) -> Generation {
        let generation = self.current_generation.fetch_add(1, Ordering::SeqCst) + 1;
        desk_info!(
            "start generation={} model_id={}",
            generation,
            request.model_id
        );
        let _ = self.cmd_tx.send(EngineCommand::StartJob {
            generation,
            request,
        });
        generation
    }

    pub fn set_api_key(&self, key: impl Into<String>) {
        self.api_key.set(key);
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_set()
    }

    pub fn current_generation(&self) -> Generation {
        self.current_generation.load(Ordering::SeqCst)
    }
}
