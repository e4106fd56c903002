// THEORY:
// Errors are split by the moment they can happen. `ConfigError` is raised while a
// session is being configured and is fatal only to that configure call.
// `InputError` is raised per frame: the frame is rejected and the pipeline stays
// usable for the next one. `DeliveryError` belongs to notification collaborators
// and is only ever logged by the core.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid detection or session parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sensitivity must be within 0..=100, got {0}")]
    SensitivityOutOfRange(u8),

    #[error("min_area must be greater than zero")]
    NonPositiveMinArea,

    #[error("blur kernel size must be odd and positive, got {0}")]
    EvenBlurKernel(u32),

    #[error("background threshold must be a positive finite number, got {0}")]
    InvalidBackgroundThreshold(f64),

    #[error("end hysteresis must span at least one frame")]
    ZeroHysteresis,

    #[error("failed to load configuration from {path}: {reason}")]
    Load { path: PathBuf, reason: String },
}

/// A frame the pipeline refused to process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("frame has zero width or height")]
    EmptyFrame,

    #[error("unsupported channel count {0}, expected 1, 3 or 4")]
    UnsupportedChannels(u8),

    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("frame is {actual:?} but the session is fixed at {expected:?} (width, height, channels)")]
    DimensionMismatch {
        expected: (u32, u32, u8),
        actual: (u32, u32, u8),
    },

    #[error("frame timestamp {timestamp:?} is earlier than the last accepted {last:?}")]
    OutOfOrder { timestamp: Duration, last: Duration },
}

/// Failure reported by a notification delivery channel.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("{channel} delivery failed: {reason}")]
    Channel { channel: String, reason: String },

    #[error("{0} delivery is not available on this host")]
    Unavailable(String),
}

impl DeliveryError {
    pub fn channel(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Channel {
            channel: channel.into(),
            reason: reason.into(),
        }
    }
}
