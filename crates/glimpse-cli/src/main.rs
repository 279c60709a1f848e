use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use glimpse_core::{ObservationProvider, ProviderKind, RecognitionError, ScriptedProvider};
use glimpse_pipeline::{
    spawn_frame_pump, DeliveryPolicy, PumpHandle, PumpOptions, RecognitionEngine, ResultPresenter,
    UiCommand,
};
use glimpse_source::{FrameSource, ImageFileSource, ImageSequenceSource, StreamingSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

mod config;
mod sink;

use config::Config;
use sink::TerminalSink;

#[derive(Parser)]
#[command(name = "glimpse", about = "Glimpse on-device recognition demo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a single picked image
    Classify {
        /// Image file to classify
        image: PathBuf,
        /// Scripted classifier (TOML)
        #[arg(short, long)]
        script: PathBuf,
        /// Print the raw result set as JSON
        #[arg(long)]
        json: bool,
    },
    /// Track faces on a frame stream; press Enter to launch
    Track {
        /// Scripted face provider (TOML)
        #[arg(short, long)]
        script: PathBuf,
        /// Directory of frames to replay
        #[arg(long, conflicts_with = "device")]
        frames: Option<PathBuf>,
        /// V4L2 device (default: $GLIMPSE_CAMERA_DEVICE)
        #[arg(long)]
        device: Option<String>,
        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
    },
    /// List video capture devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Classify {
            image,
            script,
            json,
        } => classify(&config, &image, &script, json).await,
        Commands::Track {
            script,
            frames,
            device,
            max_frames,
        } => {
            let device = device.unwrap_or_else(|| config.camera_device.clone());
            track(&config, &script, frames, &device, max_frames).await
        }
        Commands::Devices => list_devices(),
    }
}

fn load_provider(path: &Path, kind: ProviderKind) -> Result<Arc<dyn ObservationProvider>> {
    let provider = ScriptedProvider::load(path)?;
    if provider.kind() != kind {
        bail!(
            "{} is a {} script, expected {kind}",
            path.display(),
            provider.kind()
        );
    }
    Ok(Arc::new(provider))
}

async fn classify(config: &Config, image: &Path, script: &Path, json: bool) -> Result<()> {
    let provider = load_provider(script, ProviderKind::Classifier)?;
    let mut source = ImageFileSource::open(image).map_err(RecognitionError::from)?;
    let (engine, _completions) = RecognitionEngine::channel(DeliveryPolicy::Ordered)?;

    let mut presenter = ResultPresenter::new(config.presenter(), TerminalSink::stdout());
    if !json {
        presenter.present_pending();
    }

    // An image that cannot be decoded is reported like any other failed
    // classification; only a missing file aborts.
    let outcome = match source.next_frame() {
        Ok(Some(frame)) => engine.recognize(frame, provider).await,
        Ok(None) => bail!("{}: no image data", image.display()),
        Err(err) if err.is_fatal() => return Err(RecognitionError::from(err).into()),
        Err(err) => Err(RecognitionError::from(err)),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome?)?);
    } else {
        presenter.present_outcome(ProviderKind::Classifier, &outcome);
    }
    Ok(())
}

async fn track(
    config: &Config,
    script: &Path,
    frames: Option<PathBuf>,
    device: &str,
    max_frames: Option<u64>,
) -> Result<()> {
    let provider = load_provider(script, ProviderKind::FaceLandmarks)?;
    let (engine, completions) = RecognitionEngine::channel(config.stream_policy)?;
    let options = PumpOptions { max_frames };

    let pump = match frames {
        Some(dir) => {
            let capture = ImageSequenceSource::open(&dir, config.frame_interval)
                .map_err(RecognitionError::from)?;
            let source = StreamingSource::new(capture, config.stream_orientation);
            spawn_frame_pump(source, engine, provider, options)?
        }
        None => spawn_camera_pump(config, device, engine, provider, options)?,
    };

    let (commands, command_rx) = mpsc::channel(8);
    spawn_trigger_reader(commands)?;

    let presenter = ResultPresenter::new(config.presenter(), TerminalSink::stdout());
    let mut run = tokio::spawn(presenter.run(completions, command_rx));

    tokio::select! {
        result = &mut run => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, stopping frame pump");
            pump.stop();
            run.await?;
        }
    }

    let stats = tokio::task::spawn_blocking(move || pump.join()).await??;
    tracing::info!(
        frames = stats.frames,
        accepted = stats.accepted,
        dropped = stats.dropped,
        coalesced = stats.coalesced,
        skipped = stats.skipped,
        "tracking finished"
    );
    Ok(())
}

#[cfg(feature = "v4l-camera")]
fn spawn_camera_pump(
    config: &Config,
    device: &str,
    engine: RecognitionEngine,
    provider: Arc<dyn ObservationProvider>,
    options: PumpOptions,
) -> Result<PumpHandle> {
    let camera = glimpse_source::Camera::open(device).map_err(RecognitionError::from)?;
    let source = StreamingSource::new(camera, config.stream_orientation);
    Ok(spawn_frame_pump(source, engine, provider, options)?)
}

#[cfg(not(feature = "v4l-camera"))]
fn spawn_camera_pump(
    _config: &Config,
    device: &str,
    _engine: RecognitionEngine,
    _provider: Arc<dyn ObservationProvider>,
    _options: PumpOptions,
) -> Result<PumpHandle> {
    bail!("cannot open {device}: built without the v4l-camera feature, use --frames instead")
}

/// Each line on stdin presses the trigger.
fn spawn_trigger_reader(commands: mpsc::Sender<UiCommand>) -> Result<()> {
    std::thread::Builder::new()
        .name("glimpse-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                if line.is_err() || commands.blocking_send(UiCommand::Activate).is_err() {
                    break;
                }
            }
        })?;
    Ok(())
}

#[cfg(feature = "v4l-camera")]
fn list_devices() -> Result<()> {
    let devices = glimpse_source::Camera::list_devices();
    if devices.is_empty() {
        println!("No video capture devices found");
    }
    for device in devices {
        println!("{}  {} ({}, {})", device.path, device.name, device.driver, device.bus);
    }
    Ok(())
}

#[cfg(not(feature = "v4l-camera"))]
fn list_devices() -> Result<()> {
    bail!("built without the v4l-camera feature")
}
