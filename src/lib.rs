//! Depth estimation benchmark harness
//!
//! This crate drives a monocular depth model over a camera feed or a folder
//! of images and renders the resulting depth maps.
//!
//! # Flow
//!
//! 1. Collect configuration (config file, environment, flags, prompts)
//! 2. Build the inference engine for a model, input shape and device
//! 3. Run the camera loop or the image-folder loop
//! 4. Per frame: preprocess -> infer -> postprocess -> display/save
//!
//! # Module Structure
//!
//! - `config`: Layered run configuration (`BenchConfig`)
//! - `prompt`: Interactive console prompts
//! - `engine`: Inference engine adapter and backends (tract, stub)
//! - `frame`: Pre/post-processing of frames and depth maps
//! - `ingest`: Frame sources (camera, image folders)
//! - `pipeline` / `run`: Per-frame processing and the two run loops
//! - `display`: Frame sinks standing in for an on-screen window
//! - Core types: `InputShape`, `Normalization`

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

pub mod config;
pub mod device;
pub mod display;
pub mod engine;
pub mod frame;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod run;
pub mod ui;

pub use config::BenchConfig;
pub use device::Device;
pub use display::{FrameSink, NullSink, PreviewSink, SinkControl};
pub use engine::{DepthBackend, DepthMap, EngineConfig, InferEngine, StubBackend};
pub use frame::{Blob, Frame};
pub use ingest::{CameraConfig, CameraSource, ImageFolderSource};
pub use pipeline::{DepthPipeline, FrameTimings, ProcessedFrame};
pub use run::{run_camera, run_images, BenchStats};

/// Model input width and height must be multiples of this value.
pub const SHAPE_ALIGNMENT: u32 = 32;

/// Default model input edge length when the user does not provide one.
pub const DEFAULT_INPUT_SIZE: u32 = 256;

/// Number of color channels the model consumes (RGB).
pub const INPUT_CHANNELS: u32 = 3;

/// Round a dimension down to the nearest multiple of [`SHAPE_ALIGNMENT`].
pub fn align_dimension(value: u32) -> u32 {
    value - (value % SHAPE_ALIGNMENT)
}

/// Write `data` to a temp file next to `path`, sync it, then rename it into place.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    write_via_rename(path, data, true)
}

/// Like [`write_atomic`] without the sync. Readers never see a partial file,
/// but the contents may be lost on a crash.
pub(crate) fn replace_file(path: &Path, data: &[u8]) -> Result<()> {
    write_via_rename(path, data, false)
}

fn write_via_rename(path: &Path, data: &[u8], sync: bool) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        file.write_all(data)?;
        if sync {
            file.sync_all()?;
        }
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}

// -------------------- Input shape --------------------

/// Model input tensor shape, always `1 x C x H x W`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub channels: u32,
    pub height: u32,
    pub width: u32,
}

impl InputShape {
    /// Build a shape from user-provided dimensions.
    ///
    /// Width and height are rounded down to a multiple of 32. A dimension that
    /// rounds to zero is rejected.
    pub fn aligned(width: u32, height: u32) -> Result<Self> {
        let aligned_w = align_dimension(width);
        let aligned_h = align_dimension(height);
        if aligned_w == 0 || aligned_h == 0 {
            return Err(anyhow!(
                "input shape {}x{} is smaller than the minimum {}x{}",
                width,
                height,
                SHAPE_ALIGNMENT,
                SHAPE_ALIGNMENT
            ));
        }
        if aligned_w != width || aligned_h != height {
            log::info!(
                "input shape {}x{} rounded down to {}x{}",
                width,
                height,
                aligned_w,
                aligned_h
            );
        }
        Ok(Self {
            channels: INPUT_CHANNELS,
            height: aligned_h,
            width: aligned_w,
        })
    }

    /// Tensor dimensions in NCHW order.
    pub fn dims(&self) -> [usize; 4] {
        [
            1,
            self.channels as usize,
            self.height as usize,
            self.width as usize,
        ]
    }

    /// Number of pixels in one plane.
    pub fn plane_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of values in the full input tensor.
    pub fn tensor_len(&self) -> usize {
        self.plane_len() * self.channels as usize
    }
}

impl Default for InputShape {
    fn default() -> Self {
        Self {
            channels: INPUT_CHANNELS,
            height: DEFAULT_INPUT_SIZE,
            width: DEFAULT_INPUT_SIZE,
        }
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "( 1 x {} x {} x {} )",
            self.channels, self.height, self.width
        )
    }
}

// -------------------- Normalization --------------------

/// Per-channel color normalization applied when filling the input tensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Normalization {
    pub fn new(mean: [f32; 3], std: [f32; 3]) -> Result<Self> {
        if std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(anyhow!(
                "normalization std must be positive, got {:?}",
                std
            ));
        }
        if mean.iter().any(|m| !m.is_finite()) {
            return Err(anyhow!("normalization mean must be finite, got {:?}", mean));
        }
        Ok(Self { mean, std })
    }

    /// Normalize one value of channel `channel`.
    pub fn apply(&self, channel: usize, value: f32) -> f32 {
        (value - self.mean[channel]) / self.std[channel]
    }
}

impl Default for Normalization {
    /// ImageNet statistics, which the MiDaS family of depth models is trained with.
    fn default() -> Self {
        Self {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_round_down_to_multiple_of_32() {
        assert_eq!(align_dimension(256), 256);
        assert_eq!(align_dimension(300), 288);
        assert_eq!(align_dimension(31), 0);
        assert_eq!(align_dimension(383), 352);
    }

    #[test]
    fn aligned_shape_rejects_tiny_dimensions() {
        assert!(InputShape::aligned(16, 256).is_err());
        assert!(InputShape::aligned(256, 0).is_err());

        let shape = InputShape::aligned(641, 479).unwrap();
        assert_eq!(shape.width, 640);
        assert_eq!(shape.height, 448);
        assert_eq!(shape.channels, 3);
        assert_eq!(shape.dims(), [1, 3, 448, 640]);
    }

    #[test]
    fn shape_display_matches_console_summary() {
        let shape = InputShape::aligned(384, 256).unwrap();
        assert_eq!(shape.to_string(), "( 1 x 3 x 256 x 384 )");
    }

    #[test]
    fn normalization_rejects_zero_std() {
        assert!(Normalization::new([0.5; 3], [0.0, 1.0, 1.0]).is_err());
        let norm = Normalization::new([0.5; 3], [0.5; 3]).unwrap();
        assert!((norm.apply(0, 1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn replace_file_swaps_contents_without_leftovers() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("preview.png");
        replace_file(&path, b"first")?;
        replace_file(&path, b"second")?;
        assert_eq!(fs::read(&path)?, b"second");
        assert!(!path.with_extension("tmp").exists());

        write_atomic(&path, b"third")?;
        assert_eq!(fs::read(&path)?, b"third");
        Ok(())
    }
}
