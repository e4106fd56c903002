// THEORY:
// The background-model detector is the stateful, learning half of the detection
// layer. For every pixel location it keeps a running estimate of what "normal"
// looks like there, a mean and a variance, and calls a pixel foreground when the
// current value is a statistical outlier against that estimate.
//
// Key principles:
// 1.  **Exponentially weighted statistics**: mean and variance are updated every
//     frame. During warm-up the rate is `1/n`, so the model starts as a plain
//     average of what it has seen, then it settles at `LEARNING_RATE`.
// 2.  **Slow absorption of foreground**: foreground pixels still pull the mean,
//     at a fraction of the rate, but leave the variance alone (an outlier must
//     not widen its own acceptance band). A permanent scene change (a parked car,
//     a moved chair) becomes background within about a minute, while an object
//     moving through the scene stays foreground for the seconds an event lasts.
// 3.  **Warm-up**: until `WARMUP_FRAMES` frames have been absorbed the variance is
//     not trustworthy, so the detector reports no motion regardless of content.
//     This is a normal state, surfaced as `Detection::warming_up`.
// 4.  **Noise cleanup**: the raw outlier mask is opened (erode + dilate) to drop
//     isolated pixels before the configured dilation merges blobs.

use crate::config::{Algorithm, DetectionConfig};
use crate::core_modules::mask::ForegroundMask;
use crate::core_modules::motion_detector::{Detection, MotionDetector};
use image::GrayImage;
use tracing::debug;

/// Frames absorbed before the model is allowed to report motion.
pub const WARMUP_FRAMES: u32 = 30;
/// Steady-state learning rate: a 300-frame memory, 10 s at 30 fps.
pub const LEARNING_RATE: f32 = 1.0 / 300.0;
/// Share of the learning rate applied to pixels classified as foreground.
pub const FOREGROUND_LEARNING_FACTOR: f32 = 0.5;
const INITIAL_VARIANCE: f32 = 15.0;
const MIN_VARIANCE: f32 = 4.0;

/// Scales the configured distance threshold by sensitivity (0..=100 -> 1.5x..=0.5x).
pub fn scaled_threshold(background_threshold: f64, sensitivity: u8) -> f32 {
    let factor = 0.5 + (100 - sensitivity.min(100)) as f64 / 100.0;
    (background_threshold * factor) as f32
}

pub struct BackgroundModelDetector {
    threshold: f32,
    min_area: u32,
    dilation_iterations: u32,
    width: u32,
    height: u32,
    mean: Vec<f32>,
    variance: Vec<f32>,
    frames_seen: u32,
}

impl BackgroundModelDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            threshold: scaled_threshold(config.background_threshold, config.sensitivity),
            min_area: config.min_area,
            dilation_iterations: config.dilation_iterations,
            width: 0,
            height: 0,
            mean: Vec::new(),
            variance: Vec::new(),
            frames_seen: 0,
        }
    }

    /// Frames absorbed since the model was (re)seeded.
    pub fn frames_seen(&self) -> u32 {
        self.frames_seen
    }

    pub fn is_warm(&self) -> bool {
        self.frames_seen > WARMUP_FRAMES
    }

    fn seed(&mut self, frame: &GrayImage) {
        let (width, height) = frame.dimensions();
        self.width = width;
        self.height = height;
        self.mean = frame.as_raw().iter().map(|&v| v as f32).collect();
        self.variance = vec![INITIAL_VARIANCE; self.mean.len()];
        self.frames_seen = 1;
    }

    /// Classifies every pixel against the current model, then folds the frame in.
    fn classify_and_learn(&mut self, frame: &GrayImage) -> ForegroundMask {
        self.frames_seen = self.frames_seen.saturating_add(1);
        let rate = if self.frames_seen <= WARMUP_FRAMES {
            1.0 / self.frames_seen as f32
        } else {
            LEARNING_RATE
        };
        let threshold = self.threshold;

        let mut mask = ForegroundMask::empty(self.width, self.height);
        for (i, &value) in frame.as_raw().iter().enumerate() {
            let value = value as f32;
            let delta = value - self.mean[i];
            let distance = delta * delta;
            let foreground = distance > threshold * self.variance[i];

            if foreground {
                self.mean[i] += rate * FOREGROUND_LEARNING_FACTOR * delta;
                let x = (i % self.width as usize) as u32;
                let y = (i / self.width as usize) as u32;
                mask.set(x, y, true);
            } else {
                self.mean[i] += rate * delta;
                self.variance[i] =
                    (self.variance[i] + rate * (distance - self.variance[i])).max(MIN_VARIANCE);
            }
        }
        mask
    }
}

impl MotionDetector for BackgroundModelDetector {
    fn detect(&mut self, frame: &GrayImage) -> Detection {
        let (width, height) = frame.dimensions();
        if self.frames_seen == 0 || (width, height) != (self.width, self.height) {
            debug!(width, height, "seeding background model");
            self.seed(frame);
            return Detection::quiet(width, height, true);
        }

        let mut mask = self.classify_and_learn(frame);
        if self.frames_seen <= WARMUP_FRAMES {
            return Detection::quiet(width, height, true);
        }

        mask.open();
        let detection = Detection::from_mask(mask, self.dilation_iterations, self.min_area);
        debug!(
            foreground_pixels = detection.mask.count(),
            regions = detection.regions.len(),
            "background model"
        );
        detection
    }

    fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.mean.clear();
        self.variance.clear();
        self.frames_seen = 0;
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::BackgroundModel
    }
}
