use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use fluxdesk_core::{Generation, JobRequest, OutputRef, RunError, RunEvent};

use crate::engine::{EngineConfig, EngineEvent, EngineHandle, ImageError};
use crate::materialize::DecodedImage;
use crate::transport::TransportError;

type ProgressCallback = Box<dyn Fn(&RunEvent) + Send>;
type SuccessCallback = Box<dyn Fn(&[OutputRef]) + Send>;
type FailureCallback = Box<dyn Fn(&RunError) + Send>;
type ImageCallback = Box<dyn Fn(&Result<DecodedImage, ImageError>) + Send>;

#[derive(Default)]
struct Callbacks {
    progress: Option<ProgressCallback>,
    success: Option<SuccessCallback>,
    failure: Option<FailureCallback>,
    image: Option<ImageCallback>,
}

/// Callback-style consumer facade over the engine.
///
/// A pump thread delivers events to the registered callbacks in emission
/// order. Callbacks therefore run on the pump thread, not the caller's;
/// consumers that need their own thread can use [`EngineHandle`] with the
/// raw event receiver instead. The pump re-checks the run generation before
/// every delivery, so callbacks never fire for a superseded run.
pub struct JobClient {
    engine: EngineHandle,
    callbacks: Arc<Mutex<Callbacks>>,
}

impl JobClient {
    /// Client over the production HTTP transport.
    pub fn new(config: EngineConfig) -> Result<Self, TransportError> {
        let (engine, event_rx) = EngineHandle::new(config)?;
        Ok(Self::from_parts(engine, event_rx))
    }

    /// Client over an existing engine, e.g. one built with a test transport.
    pub fn from_parts(engine: EngineHandle, event_rx: mpsc::Receiver<EngineEvent>) -> Self {
        let callbacks: Arc<Mutex<Callbacks>> = Arc::new(Mutex::new(Callbacks::default()));
        let pump_callbacks = callbacks.clone();
        let pump_engine = engine.clone();

        thread::spawn(move || {
            while let Ok(event) = event_rx.recv() {
                // Stale events are dropped at the source too, but the
                // channel may still hold deliveries that raced a restart.
                if event.generation() != pump_engine.current_generation() {
                    continue;
                }
                let guard = pump_callbacks.lock().expect("callbacks lock");
                match event {
                    EngineEvent::Run { event, .. } => {
                        if let Some(progress) = &guard.progress {
                            progress(&event);
                        }
                        match &event {
                            RunEvent::Succeeded { outputs } => {
                                if let Some(success) = &guard.success {
                                    success(outputs);
                                }
                            }
                            RunEvent::Failed { error } => {
                                if let Some(failure) = &guard.failure {
                                    failure(error);
                                }
                            }
                            RunEvent::TimedOut { budget } => {
                                if let Some(failure) = &guard.failure {
                                    failure(&RunError::PollingTimeout { budget: *budget });
                                }
                            }
                            _ => {}
                        }
                    }
                    EngineEvent::Image { result, .. } => {
                        if let Some(image) = &guard.image {
                            image(&result);
                        }
                    }
                }
            }
        });

        Self { engine, callbacks }
    }

    /// Submit a new job, superseding any run still in flight.
    pub fn start(&self, request: JobRequest) -> Generation {
        self.engine.start(request)
    }

    pub fn set_api_key(&self, key: impl Into<String>) {
        self.engine.set_api_key(key);
    }

    pub fn has_api_key(&self) -> bool {
        self.engine.has_api_key()
    }

    /// Called for every run event, in transition order.
    pub fn on_progress(&self, callback: impl Fn(&RunEvent) + Send + 'static) {
        self.callbacks.lock().expect("callbacks lock").progress = Some(Box::new(callback));
    }

    /// Called once per successful run with the extracted outputs, which may
    /// be empty ("completed, no output").
    pub fn on_success(&self, callback: impl Fn(&[OutputRef]) + Send + 'static) {
        self.callbacks.lock().expect("callbacks lock").success = Some(Box::new(callback));
    }

    /// Called once per failed or timed-out run.
    pub fn on_failure(&self, callback: impl Fn(&RunError) + Send + 'static) {
        self.callbacks.lock().expect("callbacks lock").failure = Some(Box::new(callback));
    }

    /// Called with the materialization outcome of the first output.
    pub fn on_image(
        &self,
        callback: impl Fn(&Result<DecodedImage, ImageError>) + Send + 'static,
    ) {
        self.callbacks.lock().expect("callbacks lock").image = Some(Box::new(callback));
    }
}
