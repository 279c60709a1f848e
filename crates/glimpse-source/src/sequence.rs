//! Replays a directory of still images as a paced capture stream.

use crate::frame::RawFrame;
use crate::picker::decode_image;
use crate::source::{Capture, SourceError};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct ImageSequenceSource {
    frames: Vec<PathBuf>,
    next: usize,
    interval: Duration,
    last_emit: Option<Instant>,
}

impl ImageSequenceSource {
    /// Collect image files from `dir`, sorted by file name.
    ///
    /// A missing directory or one without images is reported as an
    /// unavailable device, the same as a camera that cannot be opened.
    pub fn open(dir: impl AsRef<Path>, interval: Duration) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| SourceError::DeviceUnavailable(format!("{}: {e}", dir.display())))?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(SourceError::DeviceUnavailable(format!(
                "{}: no image frames",
                dir.display()
            )));
        }

        tracing::info!(
            dir = %dir.display(),
            frames = frames.len(),
            interval_ms = interval.as_millis() as u64,
            "opened image sequence"
        );

        Ok(Self {
            frames,
            next: 0,
            interval,
            last_emit: None,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_emit {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        self.last_emit = Some(Instant::now());
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl Capture for ImageSequenceSource {
    fn capture(&mut self) -> Result<Option<RawFrame>, SourceError> {
        let Some(path) = self.frames.get(self.next).cloned() else {
            return Ok(None);
        };
        self.pace();
        // Capture hardware does not carry EXIF; the stream tag applies.
        let (mut frame, _) = decode_image(&path)?;
        frame.sequence = self.next as u32;
        self.next += 1;
        Ok(Some(frame))
    }
}
