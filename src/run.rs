//! The two run loops: live camera and image folder.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::ProgressBar;

use crate::display::{FrameSink, SinkControl};
use crate::frame::restore_size;
use crate::ingest::{CameraSource, ImageFolderSource};
use crate::pipeline::{DepthPipeline, FrameTimings};

/// Suffix appended to the input file stem for saved depth maps.
pub const DEPTH_OUTPUT_SUFFIX: &str = "_depth.png";

const CAMERA_LOG_INTERVAL: u64 = 100;

// -------------------- Benchmark statistics --------------------

/// Min / max / total of one stage across frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageStats {
    pub total: Duration,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
}

impl StageStats {
    fn record(&mut self, sample: Duration) {
        self.total += sample;
        self.min = Some(self.min.map_or(sample, |m| m.min(sample)));
        self.max = Some(self.max.map_or(sample, |m| m.max(sample)));
    }

    pub fn mean(&self, count: u64) -> Duration {
        if count == 0 {
            return Duration::ZERO;
        }
        self.total / count as u32
    }
}

/// Aggregated timings of a run.
#[derive(Clone, Debug, Default)]
pub struct BenchStats {
    pub frames: u64,
    /// Inputs that could not be decoded.
    pub skipped: u64,
    pub preprocess: StageStats,
    pub inference: StageStats,
    pub postprocess: StageStats,
    pub wall: Duration,
    /// Depth maps written to disk, each path listed once.
    pub outputs: Vec<PathBuf>,
}

impl BenchStats {
    pub fn record(&mut self, timings: &FrameTimings) {
        self.frames += 1;
        self.preprocess.record(timings.preprocess);
        self.inference.record(timings.inference);
        self.postprocess.record(timings.postprocess);
    }

    /// Frames per second over the whole run, including display and I/O.
    pub fn fps(&self) -> f64 {
        let secs = self.wall.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.frames as f64 / secs
        }
    }
}

impl fmt::Display for BenchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  frames processed: {}", self.frames)?;
        if self.skipped > 0 {
            writeln!(f, "  inputs skipped: {}", self.skipped)?;
        }
        for (name, stage) in [
            ("preprocess", &self.preprocess),
            ("inference", &self.inference),
            ("postprocess", &self.postprocess),
        ] {
            writeln!(
                f,
                "  {:<12} mean {:>8.2} ms  min {:>8.2} ms  max {:>8.2} ms",
                name,
                millis(stage.mean(self.frames)),
                millis(stage.min.unwrap_or_default()),
                millis(stage.max.unwrap_or_default())
            )?;
        }
        write!(f, "  throughput: {:.2} fps", self.fps())
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

// -------------------- Camera loop --------------------

/// Remembers the last camera health reading and reports only changes.
#[derive(Debug)]
struct HealthWatch {
    healthy: bool,
}

impl HealthWatch {
    fn new() -> Self {
        Self { healthy: true }
    }

    /// Returns the new state when it differs from the previous reading.
    fn update(&mut self, healthy: bool) -> Option<bool> {
        if healthy == self.healthy {
            return None;
        }
        self.healthy = healthy;
        Some(healthy)
    }
}

/// Process camera frames until `stop` is set, the sink asks to stop, or
/// `max_frames` frames were processed.
pub fn run_camera(
    pipeline: &mut DepthPipeline,
    source: &mut CameraSource,
    sink: &mut dyn FrameSink,
    stop: &AtomicBool,
    max_frames: Option<u64>,
) -> Result<BenchStats> {
    source.connect()?;
    let mut stats = BenchStats::default();
    let started = Instant::now();
    let mut health = HealthWatch::new();

    while !stop.load(Ordering::SeqCst) {
        if max_frames.is_some_and(|max| stats.frames >= max) {
            break;
        }
        let frame = source.next_frame()?;
        let processed = pipeline.process(&frame)?;
        stats.record(&processed.timings);

        if stats.frames % CAMERA_LOG_INTERVAL == 0 {
            log::info!(
                "camera: {} frames, mean inference {:.2} ms",
                stats.frames,
                millis(stats.inference.mean(stats.frames))
            );
        }
        match health.update(source.is_healthy()) {
            Some(false) => log::warn!("camera {} reports unhealthy", source.stats().device),
            Some(true) => log::info!("camera {} recovered", source.stats().device),
            None => {}
        }
        if sink.show(&processed.composed)? == SinkControl::Stop {
            break;
        }
    }

    stats.wall = started.elapsed();
    Ok(stats)
}

// -------------------- Image folder loop --------------------

/// Output path for the depth map of `input`: `<output_folder>/<stem>_depth.png`.
pub fn depth_output_path(input: &Path, output_folder: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    output_folder.join(format!("{stem}{DEPTH_OUTPUT_SUFFIX}"))
}

/// Output path that also encodes the folders between `input_folder` and
/// `input`: `a/b/x.png` becomes `<output_folder>/a_b_x_depth.png`.
pub fn nested_depth_output_path(input: &Path, input_folder: &Path, output_folder: &Path) -> PathBuf {
    let relative = input.strip_prefix(input_folder).unwrap_or(input);
    let mut parts: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    parts.push(
        input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string()),
    );
    output_folder.join(format!("{}{DEPTH_OUTPUT_SUFFIX}", parts.join("_")))
}

/// Pick an output path not yet written in this run. Falls back to the nested
/// name when the plain `<stem>_depth.png` is taken; `None` if both are.
fn claim_output_path(
    input: &Path,
    input_folder: &Path,
    output_folder: &Path,
    written: &mut HashSet<PathBuf>,
) -> Option<PathBuf> {
    let plain = depth_output_path(input, output_folder);
    if written.insert(plain.clone()) {
        return Some(plain);
    }
    let nested = nested_depth_output_path(input, input_folder, output_folder);
    log::warn!(
        "'{}' collides with an earlier output, writing '{}' instead",
        plain.display(),
        nested.display()
    );
    written.insert(nested.clone()).then_some(nested)
}

/// Process every image below `input_folder`.
///
/// A missing input folder is logged and yields empty statistics. Images that
/// fail to decode are skipped. Each depth map is scaled back to the size of
/// its source image before it is written. Images in different subfolders
/// that share a stem get folder-prefixed output names.
pub fn run_images(
    pipeline: &mut DepthPipeline,
    input_folder: &Path,
    output_folder: &Path,
    sink: &mut dyn FrameSink,
    progress: &ProgressBar,
) -> Result<BenchStats> {
    let mut stats = BenchStats::default();
    if !input_folder.is_dir() {
        log::warn!(
            "folder '{}' does not exist, nothing to process",
            input_folder.display()
        );
        return Ok(stats);
    }

    let source = ImageFolderSource::scan(input_folder)?;
    progress.set_length(source.len() as u64);
    let started = Instant::now();
    let mut written = HashSet::new();

    for item in source {
        let loaded = match item {
            Ok(loaded) => loaded,
            Err(err) => {
                log::warn!("{:#}", err);
                stats.skipped += 1;
                progress.inc(1);
                continue;
            }
        };
        log::info!("Loading image from '{}'", loaded.path.display());
        progress.set_message(loaded.path.display().to_string());

        let processed = pipeline.process(&loaded.frame)?;
        stats.record(&processed.timings);
        let control = sink.show(&processed.composed)?;

        fs::create_dir_all(output_folder)
            .with_context(|| format!("failed to create {}", output_folder.display()))?;
        match claim_output_path(&loaded.path, input_folder, output_folder, &mut written) {
            Some(output_path) => {
                restore_size(
                    &processed.depth,
                    loaded.frame.width(),
                    loaded.frame.height(),
                )
                .save(&output_path)
                .with_context(|| format!("failed to write {}", output_path.display()))?;
                stats.outputs.push(output_path);
            }
            None => log::warn!(
                "no free output name for '{}', depth map not saved",
                loaded.path.display()
            ),
        }
        progress.inc(1);

        if control == SinkControl::Stop {
            break;
        }
    }

    stats.wall = started.elapsed();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;
    use crate::display::NullSink;
    use crate::engine::{InferEngine, StubBackend};
    use crate::ingest::CameraConfig;
    use crate::{InputShape, Normalization};

    fn stub_pipeline() -> DepthPipeline {
        let shape = InputShape::aligned(32, 32).unwrap();
        let engine =
            InferEngine::with_backend(Box::new(StubBackend::new(shape)), shape, Device::Cpu)
                .unwrap();
        DepthPipeline::new(engine, Normalization::default())
    }

    struct StopAfter(u64);

    impl FrameSink for StopAfter {
        fn show(&mut self, _composed: &image::RgbImage) -> Result<SinkControl> {
            self.0 = self.0.saturating_sub(1);
            Ok(if self.0 == 0 {
                SinkControl::Stop
            } else {
                SinkControl::Continue
            })
        }
    }

    fn stub_camera() -> CameraSource {
        CameraSource::new(CameraConfig {
            device: "stub://bench".to_string(),
            width: 80,
            height: 60,
            target_fps: 0,
        })
        .unwrap()
    }

    #[test]
    fn output_name_uses_stem_and_suffix() {
        let out = depth_output_path(Path::new("in/sub/room.01.jpg"), Path::new("out"));
        assert_eq!(out, PathBuf::from("out/room.01_depth.png"));
    }

    #[test]
    fn nested_name_joins_folders_below_input() {
        let out = nested_depth_output_path(
            Path::new("in/a/b/x.png"),
            Path::new("in"),
            Path::new("out"),
        );
        assert_eq!(out, PathBuf::from("out/a_b_x_depth.png"));
        let out = nested_depth_output_path(Path::new("in/x.png"), Path::new("in"), Path::new("out"));
        assert_eq!(out, PathBuf::from("out/x_depth.png"));
    }

    #[test]
    fn claimed_names_never_repeat() {
        let mut written = HashSet::new();
        let (input, output) = (Path::new("in"), Path::new("out"));
        assert_eq!(
            claim_output_path(Path::new("in/a/x.png"), input, output, &mut written),
            Some(PathBuf::from("out/x_depth.png"))
        );
        assert_eq!(
            claim_output_path(Path::new("in/b/x.jpg"), input, output, &mut written),
            Some(PathBuf::from("out/b_x_depth.png"))
        );
        assert_eq!(
            claim_output_path(Path::new("in/b/x.png"), input, output, &mut written),
            None
        );
    }

    #[test]
    fn health_watch_reports_transitions_once() {
        let mut health = HealthWatch::new();
        assert_eq!(health.update(true), None);
        assert_eq!(health.update(false), Some(false));
        assert_eq!(health.update(false), None);
        assert_eq!(health.update(false), None);
        assert_eq!(health.update(true), Some(true));
        assert_eq!(health.update(true), None);
    }

    #[test]
    fn camera_loop_honours_frame_limit() -> Result<()> {
        let mut pipeline = stub_pipeline();
        let mut camera = stub_camera();
        let stop = AtomicBool::new(false);
        let stats = run_camera(&mut pipeline, &mut camera, &mut NullSink, &stop, Some(3))?;
        assert_eq!(stats.frames, 3);
        assert!(stats.inference.min <= stats.inference.max);
        Ok(())
    }

    #[test]
    fn camera_loop_stops_on_sink_request_or_flag() -> Result<()> {
        let mut pipeline = stub_pipeline();
        let mut camera = stub_camera();
        let stop = AtomicBool::new(false);
        let stats = run_camera(&mut pipeline, &mut camera, &mut StopAfter(2), &stop, None)?;
        assert_eq!(stats.frames, 2);

        stop.store(true, Ordering::SeqCst);
        let stats = run_camera(&mut pipeline, &mut camera, &mut NullSink, &stop, None)?;
        assert_eq!(stats.frames, 0);
        Ok(())
    }

    #[test]
    fn missing_folder_yields_empty_stats() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut pipeline = stub_pipeline();
        let stats = run_images(
            &mut pipeline,
            &dir.path().join("absent"),
            &dir.path().join("out"),
            &mut NullSink,
            &ProgressBar::hidden(),
        )?;
        assert_eq!(stats.frames, 0);
        assert!(!dir.path().join("out").exists());
        Ok(())
    }

    #[test]
    fn stats_summary_lists_stages() {
        let mut stats = BenchStats::default();
        stats.record(&FrameTimings {
            preprocess: Duration::from_millis(2),
            inference: Duration::from_millis(10),
            postprocess: Duration::from_millis(4),
        });
        stats.record(&FrameTimings {
            preprocess: Duration::from_millis(4),
            inference: Duration::from_millis(20),
            postprocess: Duration::from_millis(2),
        });
        stats.wall = Duration::from_secs(1);

        assert_eq!(stats.inference.mean(stats.frames), Duration::from_millis(15));
        assert_eq!(stats.inference.min, Some(Duration::from_millis(10)));
        assert_eq!(stats.postprocess.max, Some(Duration::from_millis(4)));
        assert!((stats.fps() - 2.0).abs() < 1e-9);
        let summary = stats.to_string();
        assert!(summary.contains("frames processed: 2"));
        assert!(summary.contains("inference"));
    }
}
