mod logging;
mod settings;

use std::process::ExitCode;
use std::sync::mpsc;
use std::time::Duration;

use desk_logging::{desk_error, desk_info};
use fluxdesk_core::{event_line, JobRequest, RunEvent};
use fluxdesk_engine::{EngineConfig, EngineEvent, EngineHandle};

const PREVIEW_PATH: &str = "./fluxdesk_preview.png";
const IMAGE_WAIT: Duration = Duration::from_secs(60);

const USAGE: &str = "\
Usage:
  fluxdesk_app --set-key <KEY>
  fluxdesk_app <MODEL_ID> <PROMPT> [--seed <N>] [--image-url <URL>]

Examples:
  fluxdesk_app --set-key fal-xxxxxxxx
  fluxdesk_app fal-ai/flux-pro/kontext \"a red fox in the snow\" --seed 7
";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.first().map(String::as_str) == Some("--set-key") {
        return set_key(args.get(1).map(String::as_str));
    }

    let request = match parse_request(&args) {
        Ok(request) => request,
        Err(message) => {
            eprintln!("{message}");
            eprintln!();
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    logging::initialize(logging::LogDestination::File);
    desk_info!("fluxdesk_app starting, model_id={}", request.model_id);

    let loaded = settings::load(&settings::default_path());
    let Some(api_key) = loaded.api_key else {
        eprintln!("No API key configured. Run: fluxdesk_app --set-key <KEY>");
        return ExitCode::FAILURE;
    };

    let (engine, event_rx) = match EngineHandle::new(EngineConfig::default()) {
        Ok(parts) => parts,
        Err(err) => {
            desk_error!("Failed to start engine: {}", err);
            eprintln!("Failed to start engine: {err}");
            return ExitCode::FAILURE;
        }
    };
    engine.set_api_key(api_key);
    engine.start(request);

    run_to_completion(&event_rx)
}

fn set_key(key: Option<&str>) -> ExitCode {
    let Some(key) = key.filter(|key| !key.is_empty()) else {
        eprintln!("--set-key requires a key argument");
        return ExitCode::FAILURE;
    };
    let path = settings::default_path();
    let updated = settings::Settings {
        api_key: Some(key.to_string()),
    };
    match settings::save(&path, &updated) {
        Ok(()) => {
            println!("API key saved to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Failed to save API key: {err}");
            ExitCode::FAILURE
        }
    }
}

fn parse_request(args: &[String]) -> Result<JobRequest, String> {
    let mut positional = Vec::new();
    let mut seed = None;
    let mut image_url = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--seed" => {
                let value = iter.next().ok_or("--seed requires a value")?;
                seed = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| format!("invalid seed: {value}"))?,
                );
            }
            "--image-url" => {
                let value = iter.next().ok_or("--image-url requires a value")?;
                image_url = Some(value.clone());
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown option: {other}"));
            }
            _ => positional.push(arg.clone()),
        }
    }

    let [model_id, prompt] = positional.as_slice() else {
        return Err("expected <MODEL_ID> and <PROMPT>".to_string());
    };

    let mut request = JobRequest::new(model_id).with_param("prompt", prompt.as_str());
    if let Some(seed) = seed {
        request = request.with_seed(seed);
    }
    if let Some(url) = image_url {
        request = request.with_image_urls(vec![url]);
    }
    Ok(request)
}

/// Print run events until the run reaches a terminal state. If the run
/// succeeded with at least one output, wait for the decoded image and
/// save it next to the log file.
fn run_to_completion(event_rx: &mpsc::Receiver<EngineEvent>) -> ExitCode {
    while let Ok(event) = event_rx.recv() {
        match event {
            EngineEvent::Run { event, .. } => {
                println!("{}", event_line(&event));
                match &event {
                    RunEvent::Succeeded { outputs } => {
                        if outputs.is_empty() {
                            return ExitCode::SUCCESS;
                        }
                        return await_preview(event_rx);
                    }
                    event if event.is_terminal() => return ExitCode::FAILURE,
                    _ => {}
                }
            }
            EngineEvent::Image { .. } => {}
        }
    }

    ExitCode::FAILURE
}

/// The run already succeeded; give the download a bounded wait.
fn await_preview(event_rx: &mpsc::Receiver<EngineEvent>) -> ExitCode {
    loop {
        match event_rx.recv_timeout(IMAGE_WAIT) {
            Ok(EngineEvent::Image { result, .. }) => return save_preview(result),
            Ok(_) => {}
            Err(_) => {
                eprintln!("Timed out waiting for the image download.");
                return ExitCode::FAILURE;
            }
        }
    }
}

fn save_preview(
    result: Result<fluxdesk_engine::DecodedImage, fluxdesk_engine::ImageError>,
) -> ExitCode {
    match result {
        Ok(decoded) => {
            if let Err(err) = decoded.image.save(PREVIEW_PATH) {
                desk_error!("Failed to save preview: {}", err);
                eprintln!("Failed to save preview: {err}");
                return ExitCode::FAILURE;
            }
            println!(
                "Saved {}x{} preview to {}",
                decoded.width(),
                decoded.height(),
                PREVIEW_PATH
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            desk_error!("Image unavailable: {}", err);
            eprintln!("Image unavailable: {err}");
            ExitCode::FAILURE
        }
    }
}
