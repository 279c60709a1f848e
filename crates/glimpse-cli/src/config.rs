use glimpse_core::Orientation;
use glimpse_pipeline::{AnimationTiming, DeliveryPolicy, PresenterConfig, ViewGeometry};
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Number of classifier labels shown (default: 2).
    pub top_k: usize,
    /// Presentation surface size in points.
    pub view_width: f32,
    pub view_height: f32,
    /// Height of the bottom control strip.
    pub control_inset: f32,
    /// Delivery policy for the streaming face lane.
    pub stream_policy: DeliveryPolicy,
    /// Orientation tag applied to streamed frames.
    pub stream_orientation: Orientation,
    /// Pacing between frames of an image sequence.
    pub frame_interval: Duration,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from `GLIMPSE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let view = ViewGeometry::default();
        Self {
            top_k: checked(&lookup, "GLIMPSE_TOP_K", 2, |k: &usize| *k > 0),
            view_width: checked(&lookup, "GLIMPSE_VIEW_WIDTH", view.width, positive),
            view_height: checked(&lookup, "GLIMPSE_VIEW_HEIGHT", view.height, positive),
            control_inset: checked(&lookup, "GLIMPSE_CONTROL_INSET", view.control_inset, |v: &f32| {
                v.is_finite() && *v >= 0.0
            }),
            stream_policy: parsed(&lookup, "GLIMPSE_STREAM_POLICY", DeliveryPolicy::DropWhileBusy),
            stream_orientation: parsed(
                &lookup,
                "GLIMPSE_STREAM_ORIENTATION",
                Orientation::LeftMirrored,
            ),
            frame_interval: Duration::from_millis(parsed(&lookup, "GLIMPSE_FRAME_INTERVAL_MS", 33)),
            camera_device: lookup("GLIMPSE_CAMERA_DEVICE")
                .unwrap_or_else(|| "/dev/video0".to_string()),
        }
    }

    pub fn view(&self) -> ViewGeometry {
        ViewGeometry {
            width: self.view_width,
            height: self.view_height,
            control_inset: self.control_inset,
        }
    }

    pub fn presenter(&self) -> PresenterConfig {
        PresenterConfig {
            top_k: self.top_k,
            view: self.view(),
            timing: AnimationTiming::default(),
        }
    }
}

/// Unparseable values fall back to the default with a warning.
fn parsed<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    checked(lookup, key, default, |_| true)
}

/// Like `parsed`, but values rejected by `valid` also fall back.
fn checked<T, F, V>(lookup: &F, key: &str, default: T, valid: V) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
    V: Fn(&T) -> bool,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.parse() {
        Ok(value) if valid(&value) => value,
        Ok(_) => {
            tracing::warn!(key, value = %raw, "ignoring out-of-range setting");
            default
        }
        Err(err) => {
            tracing::warn!(key, value = %raw, error = %err, "ignoring invalid setting");
            default
        }
    }
}

fn positive(value: &f32) -> bool {
    value.is_finite() && *value > 0.0
}
