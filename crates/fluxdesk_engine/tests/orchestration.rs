use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fluxdesk_core::{
    JobHandle, JobRequest, JobStatus, RunConfig, RunError, RunEvent, StatusSnapshot,
};
use fluxdesk_engine::{
    ApiKey, EngineConfig, EngineEvent, EngineHandle, ImageError, JobClient, MaterializeError,
    QueueTransport, TransportError,
};
use serde_json::{json, Value};

/// Transport scripted per model id: each poll pops the next status, and the
/// last one repeats forever (so "always IN_PROGRESS" is a one-entry script).
struct ScriptedTransport {
    statuses: Mutex<HashMap<String, VecDeque<JobStatus>>>,
    result_doc: Value,
    download_body: Vec<u8>,
    downloads: AtomicUsize,
    submit_error: Option<TransportError>,
}

impl ScriptedTransport {
    fn new(result_doc: Value, download_body: Vec<u8>) -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            result_doc,
            download_body,
            downloads: AtomicUsize::new(0),
            submit_error: None,
        }
    }

    fn script(mut self, model_id: &str, statuses: &[JobStatus]) -> Self {
        self.statuses
            .get_mut()
            .unwrap()
            .insert(model_id.to_string(), statuses.iter().copied().collect());
        self
    }

    fn failing_submit(mut self, error: TransportError) -> Self {
        self.submit_error = Some(error);
        self
    }
}

#[async_trait::async_trait]
impl QueueTransport for ScriptedTransport {
    async fn submit(&self, request: &JobRequest) -> Result<JobHandle, TransportError> {
        if let Some(error) = &self.submit_error {
            return Err(error.clone());
        }
        Ok(JobHandle {
            request_id: format!("req-{}", request.model_id),
            model_id: request.model_id.clone(),
            started: Instant::now(),
        })
    }

    async fn poll_status(&self, handle: &JobHandle) -> Result<StatusSnapshot, TransportError> {
        let mut scripts = self.statuses.lock().unwrap();
        let queue = scripts
            .get_mut(&handle.model_id)
            .unwrap_or_else(|| panic!("no script for {}", handle.model_id));
        let status = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            *queue.front().unwrap()
        };
        Ok(StatusSnapshot::of(status))
    }

    async fn fetch_result(&self, _handle: &JobHandle) -> Result<Value, TransportError> {
        Ok(self.result_doc.clone())
    }

    async fn download(&self, _url: &str) -> Result<Vec<u8>, TransportError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.download_body.is_empty() {
            return Err(TransportError::EmptyPayload);
        }
        Ok(self.download_body.clone())
    }
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        run: RunConfig {
            poll_interval: Duration::from_millis(20),
            poll_budget: Duration::from_secs(5),
        },
        ..EngineConfig::default()
    }
}

fn engine_with(
    transport: ScriptedTransport,
    config: EngineConfig,
) -> (EngineHandle, Receiver<EngineEvent>, Arc<ScriptedTransport>) {
    let transport = Arc::new(transport);
    let (engine, event_rx) =
        EngineHandle::with_transport(transport.clone(), config, ApiKey::default());
    (engine, event_rx, transport)
}

fn next_event(rx: &Receiver<EngineEvent>) -> EngineEvent {
    rx.recv_timeout(Duration::from_secs(5)).expect("engine event")
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let raster = image::RgbaImage::from_pixel(width, height, image::Rgba([9, 8, 7, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(raster)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .expect("encode test png");
    out
}

#[test]
fn happy_path_emits_events_in_order_and_materializes_first_output() {
    let transport = ScriptedTransport::new(
        json!({"images": [{"url": "http://x/1.png"}, {"url": "http://x/2.png"}]}),
        png_bytes(800, 600),
    )
    .script("m", &[JobStatus::InProgress, JobStatus::Completed]);
    let (engine, event_rx, transport) = engine_with(transport, fast_config());

    let generation = engine.start(JobRequest::new("m").with_param("prompt", "p"));

    let mut events = Vec::new();
    let image = loop {
        match next_event(&event_rx) {
            EngineEvent::Run { event, generation: g } => {
                assert_eq!(g, generation);
                events.push(event);
            }
            EngineEvent::Image { result, generation: g } => {
                assert_eq!(g, generation);
                break result;
            }
        }
    };

    assert!(matches!(events[0], RunEvent::Submitting { .. }));
    assert!(matches!(events[1], RunEvent::Submitted { .. }));
    assert!(matches!(
        &events[2],
        RunEvent::Polling { snapshot } if snapshot.status == JobStatus::InProgress
    ));
    assert!(matches!(
        &events[3],
        RunEvent::Polling { snapshot } if snapshot.status == JobStatus::Completed
    ));
    assert!(matches!(events[4], RunEvent::Fetching));
    match &events[5] {
        RunEvent::Succeeded { outputs } => {
            assert_eq!(outputs.len(), 2);
            assert_eq!(outputs[0].url, "http://x/1.png");
            assert_eq!(outputs[1].url, "http://x/2.png");
        }
        other => panic!("expected Succeeded, got {other:?}"),
    }
    assert_eq!(events.len(), 6);

    // Only the first output is materialized, bounded to the default box.
    let decoded = image.expect("image ready");
    assert!(decoded.width() <= 400 && decoded.height() <= 400);
    assert_eq!(transport.downloads.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_result_document_succeeds_without_an_image_event() {
    let transport = ScriptedTransport::new(json!({"seed": 1}), Vec::new())
        .script("m", &[JobStatus::Completed]);
    let (engine, event_rx, transport) = engine_with(transport, fast_config());

    engine.start(JobRequest::new("m").with_param("prompt", "p"));

    loop {
        match next_event(&event_rx) {
            EngineEvent::Run {
                event: RunEvent::Succeeded { outputs },
                ..
            } => {
                assert!(outputs.is_empty());
                break;
            }
            EngineEvent::Image { .. } => panic!("no image event expected"),
            _ => {}
        }
    }

    // Nothing to materialize: no download, no trailing image event.
    assert!(event_rx.recv_timeout(Duration::from_millis(300)).is_err());
    assert_eq!(transport.downloads.load(Ordering::SeqCst), 0);
}

#[test]
fn corrupt_download_reports_unsupported_format_via_image_event() {
    let transport = ScriptedTransport::new(
        json!({"image_url": "http://x/1.png"}),
        b"not an image".to_vec(),
    )
    .script("m", &[JobStatus::Completed]);
    let (engine, event_rx, _) = engine_with(transport, fast_config());

    engine.start(JobRequest::new("m").with_param("prompt", "p"));

    let result = loop {
        if let EngineEvent::Image { result, .. } = next_event(&event_rx) {
            break result;
        }
    };
    assert!(matches!(
        result,
        Err(ImageError::Materialize(MaterializeError::UnsupportedFormat(_)))
    ));
}

#[test]
fn empty_download_reports_empty_payload_via_image_event() {
    let transport = ScriptedTransport::new(json!({"image_url": "http://x/1.png"}), Vec::new())
        .script("m", &[JobStatus::Completed]);
    let (engine, event_rx, _) = engine_with(transport, fast_config());

    engine.start(JobRequest::new("m").with_param("prompt", "p"));

    let result = loop {
        if let EngineEvent::Image { result, .. } = next_event(&event_rx) {
            break result;
        }
    };
    assert!(matches!(
        result,
        Err(ImageError::Download(TransportError::EmptyPayload))
    ));
}

#[test]
fn submit_failure_surfaces_as_a_failed_event() {
    let transport = ScriptedTransport::new(json!({}), Vec::new())
        .failing_submit(TransportError::Auth);
    let (engine, event_rx, _) = engine_with(transport, fast_config());

    engine.start(JobRequest::new("m").with_param("prompt", "p"));

    loop {
        if let EngineEvent::Run {
            event: RunEvent::Failed { error },
            ..
        } = next_event(&event_rx)
        {
            assert_eq!(error, RunError::Auth);
            break;
        }
    }
}

#[test]
fn run_times_out_when_the_polling_budget_expires() {
    let transport =
        ScriptedTransport::new(json!({}), Vec::new()).script("m", &[JobStatus::InProgress]);
    let config = EngineConfig {
        run: RunConfig {
            poll_interval: Duration::from_millis(30),
            poll_budget: Duration::from_millis(100),
        },
        ..EngineConfig::default()
    };
    let (engine, event_rx, _) = engine_with(transport, config);

    engine.start(JobRequest::new("m").with_param("prompt", "p"));

    loop {
        if let EngineEvent::Run {
            event: RunEvent::TimedOut { budget },
            ..
        } = next_event(&event_rx)
        {
            assert_eq!(budget, Duration::from_millis(100));
            break;
        }
    }
    // Terminal: the abandoned run must not keep emitting.
    assert!(event_rx.recv_timeout(Duration::from_millis(300)).is_err());
}

#[test]
fn starting_a_new_job_silences_the_superseded_run() {
    let transport = ScriptedTransport::new(
        json!({"image_url": "http://x/1.png"}),
        png_bytes(64, 64),
    )
    .script("slow", &[JobStatus::InProgress])
    .script("fast", &[JobStatus::Completed]);
    let (engine, event_rx, _) = engine_with(transport, fast_config());

    let slow = engine.start(JobRequest::new("slow").with_param("prompt", "p"));

    // Let the first run reach its polling loop.
    let mut saw_slow_polling = false;
    while !saw_slow_polling {
        if let EngineEvent::Run {
            generation,
            event: RunEvent::Polling { .. },
        } = next_event(&event_rx)
        {
            assert_eq!(generation, slow);
            saw_slow_polling = true;
        }
    }

    let fast = engine.start(JobRequest::new("fast").with_param("prompt", "p"));

    // Drain until the second run's image arrives; the slow run never
    // reaches a terminal state, so any terminal event seen must be fast's.
    loop {
        let event = next_event(&event_rx);
        match &event {
            EngineEvent::Run {
                generation,
                event: run_event,
            } if run_event.is_terminal() => {
                assert_eq!(*generation, fast);
            }
            EngineEvent::Image { generation, .. } => {
                assert_eq!(*generation, fast);
                break;
            }
            _ => {}
        }
    }

    // The slow run polls every 20ms; with the gate in place it must stay
    // silent from here on.
    std::thread::sleep(Duration::from_millis(250));
    while let Ok(event) = event_rx.try_recv() {
        assert_eq!(event.generation(), fast, "stale event leaked: {event:?}");
    }
}

#[test]
fn job_client_invokes_callbacks_in_emission_order() {
    let transport = ScriptedTransport::new(
        json!({"images": [{"url": "http://x/1.png"}]}),
        png_bytes(32, 32),
    )
    .script("m", &[JobStatus::Completed]);
    let transport = Arc::new(transport);
    let (engine, event_rx) =
        EngineHandle::with_transport(transport, fast_config(), ApiKey::default());
    let client = JobClient::from_parts(engine, event_rx);

    let lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = std::sync::mpsc::channel();

    {
        let lines = lines.clone();
        client.on_progress(move |event| {
            lines.lock().unwrap().push(fluxdesk_core::event_line(event));
        });
    }
    {
        let lines = lines.clone();
        client.on_success(move |outputs| {
            lines.lock().unwrap().push(format!("success:{}", outputs.len()));
        });
    }
    {
        let lines = lines.clone();
        client.on_failure(move |error| {
            lines.lock().unwrap().push(format!("failure:{error}"));
        });
    }
    client.on_image(move |result| {
        let _ = done_tx.send(result.is_ok());
    });

    client.start(JobRequest::new("m").with_param("prompt", "p"));

    let image_ok = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("image callback");
    assert!(image_ok);

    let lines = lines.lock().unwrap().clone();
    assert_eq!(
        lines,
        vec![
            "Submitting to m...".to_string(),
            "Submitted (ID: req-m...). Polling...".to_string(),
            "Status: COMPLETED".to_string(),
            "Fetching final result...".to_string(),
            "Success! 1 image(s) ready.".to_string(),
            "success:1".to_string(),
        ]
    );
}
