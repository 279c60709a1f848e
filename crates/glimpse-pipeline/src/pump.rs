//! Drives a frame source on its own thread, feeding the engine.

use crate::engine::{EngineError, RecognitionEngine, Submission};
use glimpse_core::{ObservationProvider, RecognitionError};
use glimpse_source::FrameSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

/// Consecutive recoverable capture errors tolerated before giving up.
const MAX_CONSECUTIVE_FAILURES: u32 = 30;

#[derive(Error, Debug)]
pub enum PumpError {
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    #[error("failed to spawn frame pump thread: {0}")]
    Spawn(std::io::Error),
    #[error("frame pump thread panicked")]
    Panicked,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub frames: u64,
    pub accepted: u64,
    pub coalesced: u64,
    pub dropped: u64,
    /// Frames lost to recoverable capture errors.
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PumpOptions {
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

pub struct PumpHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<Result<PumpStats, PumpError>>,
}

impl PumpHandle {
    /// Ask the pump to stop after the current frame.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> Result<PumpStats, PumpError> {
        self.thread.join().map_err(|_| PumpError::Panicked)?
    }
}

/// Spawn a named thread that pulls frames from `source` and submits each to
/// `engine`. The pump never waits on recognition; whatever the engine's
/// policy does with a busy lane is counted in the returned stats.
pub fn spawn_frame_pump<F>(
    mut source: F,
    engine: RecognitionEngine,
    provider: Arc<dyn ObservationProvider>,
    options: PumpOptions,
) -> Result<PumpHandle, PumpError>
where
    F: FrameSource + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let thread = std::thread::Builder::new()
        .name("glimpse-pump".into())
        .spawn(move || {
            tracing::info!(provider = provider.id(), mode = ?source.mode(), "frame pump started");
            let result = pump(&mut source, &engine, &provider, &stop_flag, options);
            match &result {
                Ok(stats) => tracing::info!(?stats, "frame pump stopped"),
                Err(err) => tracing::error!(error = %err, "frame pump failed"),
            }
            result
        })
        .map_err(PumpError::Spawn)?;

    Ok(PumpHandle { stop, thread })
}

fn pump<F: FrameSource>(
    source: &mut F,
    engine: &RecognitionEngine,
    provider: &Arc<dyn ObservationProvider>,
    stop: &AtomicBool,
    options: PumpOptions,
) -> Result<PumpStats, PumpError> {
    let mut stats = PumpStats::default();
    let mut failures = 0u32;

    while !stop.load(Ordering::Relaxed) {
        if options.max_frames.is_some_and(|max| stats.frames >= max) {
            tracing::debug!(frames = stats.frames, "frame limit reached");
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!(frames = stats.frames, "source exhausted");
                break;
            }
            Err(err) if err.is_fatal() => return Err(RecognitionError::from(err).into()),
            Err(err) => {
                failures += 1;
                stats.skipped += 1;
                tracing::warn!(error = %err, failures, "frame skipped");
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    return Err(RecognitionError::DeviceUnavailable(format!(
                        "{failures} consecutive capture failures, last: {err}"
                    ))
                    .into());
                }
                continue;
            }
        };
        failures = 0;
        stats.frames += 1;

        match engine.submit(frame, provider) {
            Ok(Submission::Accepted(_)) => stats.accepted += 1,
            Ok(Submission::Coalesced { .. }) => stats.coalesced += 1,
            Ok(Submission::Dropped) => stats.dropped += 1,
            Err(EngineError::SinkClosed) => {
                tracing::info!("presentation closed, stopping pump");
                break;
            }
            Err(err) => {
                tracing::warn!(error = %err, "submit failed, stopping pump");
                break;
            }
        }
    }

    Ok(stats)
}
