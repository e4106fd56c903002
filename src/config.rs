// THEORY:
// Configuration is plain data. The host owns persistence (a JSON document) and the
// core only validates what it is handed. `DetectionConfig` parameterizes the
// detectors, `TrackerConfig` the event state machine, and `NotificationConfig` the
// cooldown gate plus the channel descriptions handed to delivery collaborators.
// Every struct carries `#[serde(default)]` so a partial document fills in with the
// stock values.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Which motion detection algorithm a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Stateless comparison of consecutive processed frames.
    FrameDifference,
    /// Per-pixel running mean/variance background estimate.
    #[default]
    BackgroundModel,
}

/// Parameters for the preprocessor and both detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub algorithm: Algorithm,
    /// 0..=100. Higher values lower the pixel difference threshold.
    pub sensitivity: u8,
    /// Minimum connected-region area, in processed pixels, that counts as motion.
    pub min_area: u32,
    /// Squared-deviation multiplier (in variances) for the background model.
    pub background_threshold: f64,
    /// Side of the Gaussian blur kernel. Must be odd; 1 disables blurring.
    pub blur_kernel_size: u32,
    /// 3x3 dilation passes applied to every foreground mask.
    pub dilation_iterations: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::BackgroundModel,
            sensitivity: 50,
            min_area: 5000,
            background_threshold: 16.0,
            blur_kernel_size: 21,
            dilation_iterations: 2,
        }
    }
}

impl DetectionConfig {
    /// Rejects parameter sets the detectors cannot run with.
    ///
    /// Even blur kernels are rejected rather than rounded, so a config that passes
    /// here is used exactly as written.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensitivity > 100 {
            return Err(ConfigError::SensitivityOutOfRange(self.sensitivity));
        }
        if self.min_area == 0 {
            return Err(ConfigError::NonPositiveMinArea);
        }
        if self.blur_kernel_size == 0 || self.blur_kernel_size % 2 == 0 {
            return Err(ConfigError::EvenBlurKernel(self.blur_kernel_size));
        }
        if !self.background_threshold.is_finite() || self.background_threshold <= 0.0 {
            return Err(ConfigError::InvalidBackgroundThreshold(
                self.background_threshold,
            ));
        }
        Ok(())
    }
}

/// Tuning for the event state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Consecutive motion-free frames required before an open event closes.
    pub end_hysteresis_frames: u32,
    /// How many completed events the session keeps for `recent_events`.
    pub history_len: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            end_hysteresis_frames: 5,
            history_len: 20,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end_hysteresis_frames == 0 {
            return Err(ConfigError::ZeroHysteresis);
        }
        Ok(())
    }
}

/// A notification destination, handed verbatim to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelConfig {
    Desktop,
    Email {
        smtp_server: String,
        smtp_port: u16,
        sender: String,
        recipient: String,
    },
    Discord {
        webhook_url: String,
    },
    Slack {
        webhook_url: String,
    },
}

impl ChannelConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelConfig::Desktop => "desktop",
            ChannelConfig::Email { .. } => "email",
            ChannelConfig::Discord { .. } => "discord",
            ChannelConfig::Slack { .. } => "slack",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    /// Minimum seconds between two fired notifications.
    pub cooldown_secs: f64,
    pub channels: Vec<ChannelConfig>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cooldown_secs: 60.0,
            channels: vec![ChannelConfig::Desktop],
        }
    }
}

impl NotificationConfig {
    /// Cooldown as a `Duration`. Negative or non-finite values collapse to zero.
    pub fn cooldown(&self) -> Duration {
        Duration::try_from_secs_f64(self.cooldown_secs).unwrap_or(Duration::ZERO)
    }
}

/// Everything a single camera session needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub detection: DetectionConfig,
    pub tracker: TrackerConfig,
    pub notifications: NotificationConfig,
    /// Capacity of the capture queue and of every collaborator queue.
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            tracker: TrackerConfig::default(),
            notifications: NotificationConfig::default(),
            queue_capacity: 32,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection.validate()?;
        self.tracker.validate()
    }

    /// Reads and validates a JSON session document.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let load_error = |reason: String| ConfigError::Load {
            path: path.to_path_buf(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let config: SessionConfig =
            serde_json::from_str(&text).map_err(|e| load_error(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn detection_config_round_trips_through_json() {
        let config = DetectionConfig {
            algorithm: Algorithm::FrameDifference,
            sensitivity: 73,
            min_area: 420,
            background_threshold: 9.5,
            blur_kernel_size: 7,
            dilation_iterations: 0,
        };
        let json = serde_json::to_string(&config).unwrap();
        let restored: DetectionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn rejects_out_of_range_parameters() {
        let base = DetectionConfig::default();

        let config = DetectionConfig { sensitivity: 101, ..base.clone() };
        assert!(matches!(config.validate(), Err(ConfigError::SensitivityOutOfRange(101))));

        let config = DetectionConfig { min_area: 0, ..base.clone() };
        assert!(matches!(config.validate(), Err(ConfigError::NonPositiveMinArea)));

        let config = DetectionConfig { blur_kernel_size: 4, ..base.clone() };
        assert!(matches!(config.validate(), Err(ConfigError::EvenBlurKernel(4))));

        let config = DetectionConfig { blur_kernel_size: 0, ..base.clone() };
        assert!(matches!(config.validate(), Err(ConfigError::EvenBlurKernel(0))));

        let config = DetectionConfig { background_threshold: f64::NAN, ..base };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBackgroundThreshold(_))
        ));
    }

    #[test]
    fn partial_session_document_uses_defaults() {
        let json = r#"{
            "detection": { "algorithm": "frame_difference", "min_area": 100 },
            "notifications": {
                "enabled": true,
                "channels": [{ "kind": "slack", "webhook_url": "https://hooks.example/abc" }]
            }
        }"#;
        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.detection.algorithm, Algorithm::FrameDifference);
        assert_eq!(config.detection.min_area, 100);
        assert_eq!(config.detection.blur_kernel_size, 21);
        assert_eq!(config.tracker, TrackerConfig::default());
        assert_eq!(config.notifications.cooldown(), Duration::from_secs(60));
        assert_eq!(config.notifications.channels[0].name(), "slack");
    }

    #[test]
    fn zero_hysteresis_is_rejected() {
        let config = SessionConfig {
            tracker: TrackerConfig { end_hysteresis_frames: 0, history_len: 4 },
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroHysteresis)));
    }
}
