use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::device::Device;
use crate::ingest::CameraConfig;
use crate::{InputShape, Normalization, DEFAULT_INPUT_SIZE};

pub const DEFAULT_MODEL_ROOT: &str = "../";
pub const DEFAULT_CACHE_DIR: &str = "../cache";
pub const DEFAULT_INPUT_FOLDER: &str = "../input";
pub const DEFAULT_OUTPUT_FOLDER: &str = "../output";
const DEFAULT_IMAGE_DWELL_MS: u64 = 1000;
const PREVIEW_FILE: &str = "preview.png";

#[derive(Debug, Deserialize, Default)]
struct BenchConfigFile {
    model_root: Option<PathBuf>,
    model_path: Option<String>,
    cache_dir: Option<PathBuf>,
    /// Folder of input images, or "camera".
    input: Option<String>,
    output_folder: Option<PathBuf>,
    device: Option<String>,
    shape: Option<ShapeConfigFile>,
    normalization: Option<NormalizationConfigFile>,
    camera: Option<CameraConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ShapeConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct NormalizationConfigFile {
    mean: Option<[f32; 3]>,
    std: Option<[f32; 3]>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    preview_path: Option<PathBuf>,
    dwell_ms: Option<u64>,
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Camera,
    Folder(PathBuf),
}

impl InputMode {
    /// Parse a user answer: an empty answer or "camera" selects the camera.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("camera") {
            InputMode::Camera
        } else {
            InputMode::Folder(PathBuf::from(trimmed))
        }
    }
}

/// Run configuration.
///
/// Fields left as `None` are asked for interactively.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub model_root: PathBuf,
    pub model_path: Option<String>,
    pub cache_dir: PathBuf,
    pub input: Option<InputMode>,
    pub output_folder: PathBuf,
    pub device: Option<Device>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub normalization: Normalization,
    pub camera: CameraConfig,
    pub max_frames: Option<u64>,
    pub preview_path: Option<PathBuf>,
    /// Pause after showing each image in folder mode.
    pub image_dwell: Duration,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            model_root: PathBuf::from(DEFAULT_MODEL_ROOT),
            model_path: None,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            input: None,
            output_folder: PathBuf::from(DEFAULT_OUTPUT_FOLDER),
            device: None,
            width: None,
            height: None,
            normalization: Normalization::default(),
            camera: CameraConfig::default(),
            max_frames: None,
            preview_path: None,
            image_dwell: Duration::from_millis(DEFAULT_IMAGE_DWELL_MS),
        }
    }
}

impl BenchConfig {
    /// Load defaults, then the JSON file named by `DEPTH_BENCH_CONFIG`, then
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DEPTH_BENCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: BenchConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let device = file
            .device
            .as_deref()
            .map(str::parse::<Device>)
            .transpose()?;
        let normalization = match file.normalization {
            Some(norm) => Normalization::new(
                norm.mean.unwrap_or(defaults.normalization.mean),
                norm.std.unwrap_or(defaults.normalization.std),
            )?,
            None => defaults.normalization.clone(),
        };
        let camera = CameraConfig {
            device: file
                .camera
                .as_ref()
                .and_then(|camera| camera.device.clone())
                .unwrap_or(defaults.camera.device.clone()),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(defaults.camera.width),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(defaults.camera.height),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(defaults.camera.target_fps),
        };
        Ok(Self {
            model_root: file.model_root.unwrap_or(defaults.model_root),
            model_path: file.model_path,
            cache_dir: file.cache_dir.unwrap_or(defaults.cache_dir),
            input: file.input.as_deref().map(InputMode::parse),
            output_folder: file.output_folder.unwrap_or(defaults.output_folder),
            device,
            width: file.shape.as_ref().and_then(|shape| shape.width),
            height: file.shape.as_ref().and_then(|shape| shape.height),
            normalization,
            max_frames: file.camera.and_then(|camera| camera.max_frames),
            camera,
            preview_path: file
                .display
                .as_ref()
                .and_then(|display| display.preview_path.clone()),
            image_dwell: file
                .display
                .and_then(|display| display.dwell_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.image_dwell),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(model) = std::env::var("DEPTH_BENCH_MODEL") {
            if !model.trim().is_empty() {
                self.model_path = Some(model);
            }
        }
        if let Ok(root) = std::env::var("DEPTH_BENCH_MODEL_ROOT") {
            if !root.trim().is_empty() {
                self.model_root = PathBuf::from(root);
            }
        }
        if let Ok(device) = std::env::var("DEPTH_BENCH_DEVICE") {
            if !device.trim().is_empty() {
                self.device = Some(device.parse().map_err(|_| {
                    anyhow!("DEPTH_BENCH_DEVICE must be one of cpu, gpu, vpu")
                })?);
            }
        }
        if let Ok(dir) = std::env::var("DEPTH_BENCH_CACHE_DIR") {
            if !dir.trim().is_empty() {
                self.cache_dir = PathBuf::from(dir);
            }
        }
        if let Ok(input) = std::env::var("DEPTH_BENCH_INPUT") {
            self.input = Some(InputMode::parse(&input));
        }
        if let Ok(output) = std::env::var("DEPTH_BENCH_OUTPUT") {
            if !output.trim().is_empty() {
                self.output_folder = PathBuf::from(output);
            }
        }
        if let Ok(camera) = std::env::var("DEPTH_BENCH_CAMERA") {
            if !camera.trim().is_empty() {
                self.camera.device = camera;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if let Some(value) = value {
                if crate::align_dimension(value) == 0 {
                    return Err(anyhow!(
                        "input {} must be at least {}, got {}",
                        name,
                        crate::SHAPE_ALIGNMENT,
                        value
                    ));
                }
            }
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera capture size must be non-zero"));
        }
        if self.max_frames == Some(0) {
            return Err(anyhow!("max_frames must be greater than zero"));
        }
        Ok(())
    }

    /// Input shape from the configured (or default) width and height.
    pub fn shape(&self) -> Result<InputShape> {
        InputShape::aligned(
            self.width.unwrap_or(DEFAULT_INPUT_SIZE),
            self.height.unwrap_or(DEFAULT_INPUT_SIZE),
        )
    }

    /// Preview file, defaulting to `preview.png` in the output folder.
    pub fn preview_path(&self) -> PathBuf {
        self.preview_path
            .clone()
            .unwrap_or_else(|| self.output_folder.join(PREVIEW_FILE))
    }
}

fn read_config_file(path: &Path) -> Result<BenchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_mode_parses_camera_and_folders() {
        assert_eq!(InputMode::parse(""), InputMode::Camera);
        assert_eq!(InputMode::parse("  Camera "), InputMode::Camera);
        assert_eq!(
            InputMode::parse("../input"),
            InputMode::Folder(PathBuf::from("../input"))
        );
    }

    #[test]
    fn empty_file_keeps_defaults() -> Result<()> {
        let cfg = BenchConfig::from_file(BenchConfigFile::default())?;
        assert_eq!(cfg.cache_dir, PathBuf::from("../cache"));
        assert_eq!(cfg.model_root, PathBuf::from("../"));
        assert_eq!(cfg.normalization, Normalization::default());
        assert_eq!(cfg.shape()?, InputShape::default());
        assert_eq!(cfg.preview_path(), PathBuf::from("../output/preview.png"));
        assert!(cfg.input.is_none());
        Ok(())
    }

    #[test]
    fn validate_rejects_tiny_width() {
        let mut cfg = BenchConfig {
            width: Some(20),
            ..BenchConfig::default()
        };
        assert!(cfg.validate().is_err());
        cfg.width = Some(300);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.shape().unwrap().width, 288);
    }
}
