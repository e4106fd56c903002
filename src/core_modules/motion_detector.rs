// THEORY:
// Both detection algorithms answer the same question for a preprocessed frame:
// which pixels are foreground, and does any of it add up to motion? This module
// holds the capability they share, the `MotionDetector` trait, and the factory
// that picks one at configure time. The pipeline only ever talks to a
// `Box<dyn MotionDetector>`, so swapping algorithms never touches the tracker.

use crate::config::{Algorithm, DetectionConfig};
use crate::core_modules::background_model::BackgroundModelDetector;
use crate::core_modules::frame_difference::FrameDifferenceDetector;
use crate::core_modules::mask::ForegroundMask;
use crate::core_modules::region_extractor::{Region, extract_regions};
use image::GrayImage;

/// Per-frame detector output.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// `true` iff `regions` is non-empty.
    pub motion: bool,
    pub mask: ForegroundMask,
    pub regions: Vec<Region>,
    /// Set while an adaptive model is still gathering its initial statistics.
    pub warming_up: bool,
}

impl Detection {
    /// A no-motion result with an all-background mask.
    pub fn quiet(width: u32, height: u32, warming_up: bool) -> Self {
        Self {
            motion: false,
            mask: ForegroundMask::empty(width, height),
            regions: Vec::new(),
            warming_up,
        }
    }

    /// Dilates a raw mask, extracts regions and derives the motion flag.
    pub(crate) fn from_mask(mut mask: ForegroundMask, dilation_iterations: u32, min_area: u32) -> Self {
        mask.dilate(dilation_iterations);
        let regions = extract_regions(&mask, min_area);
        Self {
            motion: !regions.is_empty(),
            mask,
            regions,
            warming_up: false,
        }
    }
}

/// A motion detection algorithm operating on preprocessed grayscale frames.
pub trait MotionDetector: Send {
    /// Classifies `frame` and updates any internal reference state.
    fn detect(&mut self, frame: &GrayImage) -> Detection;

    /// Forgets all reference state, as if no frame had been seen.
    fn reset(&mut self);

    fn algorithm(&self) -> Algorithm;
}

/// Instantiates the detector named by `config.algorithm`.
pub fn build_detector(config: &DetectionConfig) -> Box<dyn MotionDetector> {
    match config.algorithm {
        Algorithm::FrameDifference => Box::new(FrameDifferenceDetector::new(config)),
        Algorithm::BackgroundModel => Box::new(BackgroundModelDetector::new(config)),
    }
}
