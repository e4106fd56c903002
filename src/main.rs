// Demo host for the `motion_sentinel` library.
//
// Plays a directory of still images back as a live feed at a fixed frame rate,
// runs one detection session over it and prints a JSON summary. Collaborators
// only log what they receive. Ctrl-C stops the session early.
//
// Usage: motion_sentinel <FRAMES_DIR> [--config FILE] [--fps N]

use anyhow::{Context, bail};
use async_trait::async_trait;
use motion_sentinel::{
    CapturedFrame, ChannelConfig, DeliveryError, EventDispatcher, Frame, MotionEvent,
    MotionPipeline, NotificationDelivery, RecordingBridge, SessionConfig, StatisticsSink,
    Timestamp, run_session,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];

struct Args {
    frames_dir: PathBuf,
    config: Option<PathBuf>,
    fps: f64,
}

impl Args {
    fn parse() -> anyhow::Result<Self> {
        Self::parse_from(std::env::args().skip(1))
    }

    fn parse_from(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut frames_dir = None;
        let mut config = None;
        let mut fps: f64 = 10.0;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    config = Some(PathBuf::from(args.next().context("--config needs a file path")?));
                }
                "--fps" => {
                    let value = args.next().context("--fps needs a number")?;
                    fps = value.parse().with_context(|| format!("invalid --fps value {value:?}"))?;
                }
                _ if frames_dir.is_none() => frames_dir = Some(PathBuf::from(&arg)),
                other => bail!("unexpected argument {other:?}"),
            }
        }

        if !(fps.is_finite() && fps > 0.0) {
            bail!("--fps must be a positive number, got {fps}");
        }
        Ok(Self {
            frames_dir: frames_dir
                .context("usage: motion_sentinel <FRAMES_DIR> [--config FILE] [--fps N]")?,
            config,
            fps,
        })
    }
}

/// Stand-in for a video writer: counts the frames each event would have recorded.
#[derive(Default)]
struct LogRecorder {
    frames: HashMap<u64, u32>,
}

#[async_trait]
impl RecordingBridge for LogRecorder {
    async fn record_frame(&mut self, event_id: u64, _frame: Arc<Frame>, timestamp: Timestamp) {
        *self.frames.entry(event_id).or_default() += 1;
        debug!(event_id, ?timestamp, "frame recorded");
    }

    async fn finish_event(&mut self, event: Arc<MotionEvent>) {
        let frames = self.frames.remove(&event.id).unwrap_or(0);
        info!(event_id = event.id, frames, "recording finished");
    }
}

#[derive(Default)]
struct LogStatistics {
    events: u64,
    total: Duration,
}

#[async_trait]
impl StatisticsSink for LogStatistics {
    async fn record_event(&mut self, event: Arc<MotionEvent>) {
        self.events += 1;
        self.total += event.duration();
        info!(
            event_id = event.id,
            events = self.events,
            total_secs = self.total.as_secs_f64(),
            "statistics updated"
        );
    }
}

/// Announces desktop notifications in the log. Remote channels are not wired up
/// in the demo and report themselves unavailable.
struct LogDelivery;

#[async_trait]
impl NotificationDelivery for LogDelivery {
    async fn deliver(&self, event: &MotionEvent, channel: &ChannelConfig) -> Result<(), DeliveryError> {
        match channel {
            ChannelConfig::Desktop => {
                info!(
                    event_id = event.id,
                    duration_secs = event.duration().as_secs_f64(),
                    "motion detected"
                );
                Ok(())
            }
            other => Err(DeliveryError::Unavailable(other.name().to_string())),
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("motion_sentinel=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
    Ok(())
}

/// Image files in `dir`, sorted by name.
fn frame_paths(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
        if is_image {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Decodes frames one by one and paces them at `fps` on the session clock.
async fn capture(paths: Vec<PathBuf>, fps: f64, tx: mpsc::Sender<CapturedFrame>) -> anyhow::Result<()> {
    let period = Duration::from_secs_f64(1.0 / fps);
    let mut ticker = tokio::time::interval(period);

    for (index, path) in paths.into_iter().enumerate() {
        ticker.tick().await;
        let display = path.display().to_string();
        let image = tokio::task::spawn_blocking(move || image::open(path))
            .await?
            .with_context(|| format!("failed to decode {display}"))?;
        let captured = CapturedFrame {
            frame: Frame::from(&image),
            timestamp: period.mul_f64(index as f64),
        };
        if tx.send(captured).await.is_err() {
            debug!("session closed, capture stopping");
            break;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let args = Args::parse()?;

    let config = match &args.config {
        Some(path) => SessionConfig::from_path(path)
            .with_context(|| format!("failed to load session config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    let paths = frame_paths(&args.frames_dir)?;
    if paths.is_empty() {
        bail!("no image files found in {}", args.frames_dir.display());
    }
    info!(frames = paths.len(), fps = args.fps, "starting motion_sentinel");

    let dispatcher = EventDispatcher::builder(config.queue_capacity)
        .recording(LogRecorder::default())
        .statistics(LogStatistics::default())
        .notifications(LogDelivery, config.notifications.channels.clone())
        .spawn();
    let pipeline = MotionPipeline::with_sink(config.clone(), dispatcher)?;

    let (frame_tx, frame_rx) = mpsc::channel(config.queue_capacity.max(1));
    let (stop_tx, stop_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            let _ = stop_tx.send(true);
        }
    });
    let capture_task = tokio::spawn(capture(paths, args.fps, frame_tx));

    let (pipeline, summary) = run_session(pipeline, frame_rx, stop_rx).await;
    if let Err(e) = capture_task.await? {
        warn!(error = %e, "capture ended early");
    }

    let dropped = pipeline.into_sink().shutdown().await;
    if dropped > 0 {
        warn!(dropped, "collaborator messages were dropped");
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Args> {
        Args::parse_from(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn fps_defaults_to_ten() {
        let args = parse(&["frames"]).unwrap();
        assert_eq!(args.frames_dir, PathBuf::from("frames"));
        assert_eq!(args.fps, 10.0);
        assert!(args.config.is_none());
    }

    #[test]
    fn flags_are_read_in_any_order() {
        let args = parse(&["--fps", "25", "frames", "--config", "session.json"]).unwrap();
        assert_eq!(args.fps, 25.0);
        assert_eq!(args.config, Some(PathBuf::from("session.json")));
    }

    #[test]
    fn non_positive_fps_is_rejected() {
        assert!(parse(&["frames", "--fps", "0"]).is_err());
        assert!(parse(&["frames", "--fps", "fast"]).is_err());
        assert!(parse(&[]).is_err());
    }
}
