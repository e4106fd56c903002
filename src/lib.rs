// THEORY:
// This file is the entry point for the `motion_sentinel` library crate. It turns a
// stream of raw video frames into debounced, timestamped motion events and hands
// them to whatever records, counts or announces them.
//
// The high-level interface is `MotionPipeline`, one object per camera session.
// `runner::run_session` drives it from an async frame queue and
// `dispatch::EventDispatcher` carries its output to collaborator tasks. The
// `core_modules` hold the layered engine underneath, leaves first: frame and
// preprocessing, the two detectors, region extraction, the event tracker and the
// notification gate.

pub mod config;
pub mod core_modules;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod runner;
pub mod stats;

pub use config::{Algorithm, ChannelConfig, DetectionConfig, NotificationConfig, SessionConfig, TrackerConfig};
pub use core_modules::event_tracker::{EventLogRow, MotionEvent, Phase, RegionSnapshot, Timestamp};
pub use core_modules::frame::Frame;
pub use core_modules::region_extractor::Region;
pub use dispatch::{EventDispatcher, EventSink, NotificationDelivery, RecordingBridge, StatisticsSink};
pub use error::{ConfigError, DeliveryError, InputError};
pub use pipeline::{FrameResult, MotionPipeline};
pub use runner::{CapturedFrame, SessionSummary, run_session};
pub use stats::SessionStats;
