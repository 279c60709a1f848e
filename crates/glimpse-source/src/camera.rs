//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, FrameError, RawFrame};
use crate::source::{Capture, SourceError};
use glimpse_core::PixelFormat;
use ouroboros::self_referencing;
use std::path::Path;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture as _;
use v4l::FourCC;

const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;
/// Frames discarded after stream start while auto exposure settles.
const WARMUP_FRAMES: usize = 4;

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Wire format negotiated with the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, extract Y channel).
    Yuyv,
    /// 8-bit grayscale.
    Grey,
    /// 16-bit little-endian grayscale.
    Y16,
}

/// The device together with the mmap stream borrowing it. The stream stays
/// on for the camera's lifetime and is stopped when it is dropped.
#[self_referencing]
struct CameraStream {
    device: Device,
    #[borrows(device)]
    #[not_covariant]
    stream: MmapStream<'this>,
}

/// V4L2 camera device handle. Frames are delivered as `Gray8`.
pub struct Camera {
    stream: CameraStream,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    wire_format: WireFormat,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    ///
    /// Every failure to acquire the device is `DeviceUnavailable`.
    pub fn open(device_path: &str) -> Result<Self, SourceError> {
        let unavailable = |reason: String| SourceError::DeviceUnavailable(format!("{device_path}: {reason}"));

        if !Path::new(device_path).exists() {
            return Err(unavailable("no such device".into()));
        }

        let device = Device::with_path(device_path).map_err(|e| unavailable(e.to_string()))?;

        let caps = device
            .query_caps()
            .map_err(|e| unavailable(format!("failed to query capabilities: {e}")))?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(unavailable("not a video capture device".into()));
        }

        let mut fmt = device
            .format()
            .map_err(|e| unavailable(format!("failed to get format: {e}")))?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = CAPTURE_WIDTH;
        fmt.height = CAPTURE_HEIGHT;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| unavailable(format!("failed to set format: {e}")))?;

        let fourcc = negotiated.fourcc;
        let wire_format = if fourcc == FourCC::new(b"YUYV") {
            WireFormat::Yuyv
        } else if fourcc == FourCC::new(b"GREY") {
            WireFormat::Grey
        } else if fourcc == FourCC::new(b"Y16 ") {
            WireFormat::Y16
        } else {
            return Err(unavailable(format!(
                "unsupported pixel format {fourcc:?} (need YUYV, GREY or Y16)"
            )));
        };

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );

        let mut stream = CameraStreamTryBuilder {
            device,
            stream_builder: |device| {
                MmapStream::with_buffers(device, BufType::VideoCapture, STREAM_BUFFERS)
            },
        }
        .try_build()
        .map_err(|e| unavailable(format!("failed to start mmap stream: {e}")))?;

        for _ in 0..WARMUP_FRAMES {
            stream
                .with_stream_mut(|stream| stream.next().map(|_| ()))
                .map_err(|e| unavailable(format!("warmup capture failed: {e}")))?;
        }
        tracing::debug!(frames = WARMUP_FRAMES, "discarded warmup frames");

        Ok(Self {
            stream,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            wire_format,
        })
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps
                .capabilities
                .contains(v4l::capability::Flags::VIDEO_CAPTURE)
            {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

fn to_grayscale(format: WireFormat, width: u32, height: u32, buf: &[u8]) -> Result<Vec<u8>, SourceError> {
    let converted = match format {
        WireFormat::Grey => frame::frame_len(width, height, 1).and_then(|pixels| {
            buf.get(..pixels)
                .map(<[u8]>::to_vec)
                .ok_or(FrameError::InvalidLength {
                    expected: pixels,
                    actual: buf.len(),
                })
        }),
        WireFormat::Y16 => frame::y16_to_grayscale(buf, width, height),
        WireFormat::Yuyv => frame::yuyv_to_grayscale(buf, width, height),
    };
    converted.map_err(|e| SourceError::CaptureFailed(format!("{format:?}: {e}")))
}

impl Capture for Camera {
    fn capture(&mut self) -> Result<Option<RawFrame>, SourceError> {
        let (format, width, height) = (self.wire_format, self.width, self.height);
        let (data, sequence) = self.stream.with_stream_mut(|stream| {
            let (buf, meta) = stream
                .next()
                .map_err(|e| SourceError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
            Ok::<_, SourceError>((to_grayscale(format, width, height, buf)?, meta.sequence))
        })?;

        Ok(Some(RawFrame {
            data,
            width,
            height,
            format: PixelFormat::Gray8,
            sequence,
            timestamp: std::time::Instant::now(),
        }))
    }
}
