// Leaf-first: frame -> preprocessor -> detectors -> regions -> tracker -> gate.

pub mod frame;
pub mod preprocessor;
pub mod mask;
pub mod region_extractor;
pub mod motion_detector;
pub mod frame_difference;
pub mod background_model;
pub mod event_tracker;
pub mod notification_gate;
