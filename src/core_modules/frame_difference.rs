// THEORY:
// The frame-difference detector is the simplest temporal comparison: a pixel is
// foreground when it changed by more than a threshold since the previous frame.
// Its only memory is that previous frame. With no previous frame (first frame of a
// session, after a reset, or after the geometry changed) it reports no motion and
// keeps the frame as the next reference.

use crate::config::{Algorithm, DetectionConfig};
use crate::core_modules::mask::ForegroundMask;
use crate::core_modules::motion_detector::{Detection, MotionDetector};
use image::GrayImage;
use tracing::debug;

/// Difference threshold at sensitivity 100.
const MIN_DIFF_THRESHOLD: u8 = 5;

/// Maps sensitivity 0..=100 onto an absolute intensity threshold 105..=5.
pub fn difference_threshold(sensitivity: u8) -> u8 {
    MIN_DIFF_THRESHOLD + (100 - sensitivity.min(100))
}

pub struct FrameDifferenceDetector {
    threshold: u8,
    min_area: u32,
    dilation_iterations: u32,
    previous: Option<GrayImage>,
}

impl FrameDifferenceDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            threshold: difference_threshold(config.sensitivity),
            min_area: config.min_area,
            dilation_iterations: config.dilation_iterations,
            previous: None,
        }
    }
}

impl MotionDetector for FrameDifferenceDetector {
    fn detect(&mut self, frame: &GrayImage) -> Detection {
        let (width, height) = frame.dimensions();
        let previous = match self.previous.replace(frame.clone()) {
            Some(prev) if prev.dimensions() == frame.dimensions() => prev,
            _ => {
                debug!("no reference frame yet, storing current frame");
                return Detection::quiet(width, height, false);
            }
        };

        let threshold = self.threshold;
        let mask = ForegroundMask::from_fn(width, height, |x, y| {
            frame.get_pixel(x, y)[0].abs_diff(previous.get_pixel(x, y)[0]) > threshold
        });

        let detection = Detection::from_mask(mask, self.dilation_iterations, self.min_area);
        debug!(
            changed_pixels = detection.mask.count(),
            regions = detection.regions.len(),
            "frame difference"
        );
        detection
    }

    fn reset(&mut self) {
        self.previous = None;
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::FrameDifference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn config() -> DetectionConfig {
        DetectionConfig {
            algorithm: Algorithm::FrameDifference,
            sensitivity: 50,
            min_area: 20,
            dilation_iterations: 1,
            ..DetectionConfig::default()
        }
    }

    fn frame_with_square(value: u8, x0: u32, y0: u32, side: u32) -> GrayImage {
        GrayImage::from_fn(32, 32, |x, y| {
            if (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y) {
                Luma([value])
            } else {
                Luma([30])
            }
        })
    }

    #[test]
    fn sensitivity_lowers_threshold() {
        assert_eq!(difference_threshold(100), 5);
        assert_eq!(difference_threshold(50), 55);
        assert_eq!(difference_threshold(0), 105);
        assert!(difference_threshold(80) < difference_threshold(20));
    }

    #[test]
    fn first_frame_reports_no_motion() {
        let mut detector = FrameDifferenceDetector::new(&config());
        let detection = detector.detect(&frame_with_square(200, 4, 4, 8));
        assert!(!detection.motion);
        assert!(detection.mask.is_empty());
        assert!(!detection.warming_up);
    }

    #[test]
    fn identical_frames_yield_empty_mask() {
        let mut detector = FrameDifferenceDetector::new(&config());
        let frame = frame_with_square(200, 4, 4, 8);
        detector.detect(&frame);
        let detection = detector.detect(&frame);
        assert!(!detection.motion);
        assert!(detection.mask.is_empty());
        assert!(detection.regions.is_empty());
    }

    #[test]
    fn moved_square_is_detected() {
        let mut detector = FrameDifferenceDetector::new(&config());
        detector.detect(&frame_with_square(200, 4, 4, 8));
        let detection = detector.detect(&frame_with_square(200, 18, 18, 8));
        assert!(detection.motion);
        assert_eq!(detection.regions.len(), 2);
    }

    #[test]
    fn small_changes_stay_below_threshold() {
        let mut detector = FrameDifferenceDetector::new(&config());
        detector.detect(&frame_with_square(60, 4, 4, 8));
        let detection = detector.detect(&frame_with_square(100, 4, 4, 8));
        assert!(!detection.motion);
        assert!(detection.mask.is_empty());
    }

    #[test]
    fn reset_forgets_reference() {
        let mut detector = FrameDifferenceDetector::new(&config());
        detector.detect(&frame_with_square(200, 4, 4, 8));
        detector.reset();
        let detection = detector.detect(&frame_with_square(200, 18, 18, 8));
        assert!(!detection.motion);
    }
}
