//! Frame buffers and the pre/post-processing around inference.
//!
//! - `Frame`: a captured or decoded RGB8 image.
//! - `Blob`: the preprocessed HWC f32 buffer handed to the engine.
//! - Depth rendering: `depth_to_gray` and `compose_side_by_side`.
//!
//! Every buffer here lives for one frame and is overwritten by the next.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::engine::DepthMap;
use crate::InputShape;

/// Largest value of an 8-bit depth visualization.
pub const DEPTH_MAX_VALUE: f32 = 255.0;

// ----------------------------------------------------------------------------
// Frame: one RGB8 image
// ----------------------------------------------------------------------------

/// A single RGB8 frame from a camera or an image file.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: RgbImage,
    /// Position of this frame in its source (1-based).
    pub sequence: u64,
}

impl Frame {
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self { image, sequence }
    }

    /// Wrap packed RGB24 bytes.
    pub fn from_rgb_bytes(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("failed to wrap {}x{} RGB frame", width, height))?;
        Ok(Self::new(image, sequence))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

// ----------------------------------------------------------------------------
// Blob: preprocessed model input
// ----------------------------------------------------------------------------

/// Preprocessed pixels in HWC order, RGB, scaled into `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Blob {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl Blob {
    pub fn from_rgb(image: &RgbImage) -> Self {
        let data = image
            .as_raw()
            .iter()
            .map(|&v| v as f32 / 255.0)
            .collect();
        Self {
            data,
            width: image.width(),
            height: image.height(),
            channels: 3,
        }
    }

    /// Value at pixel `(x, y)` for `channel`.
    pub fn at(&self, x: usize, y: usize, channel: usize) -> f32 {
        self.data[(y * self.width as usize + x) * self.channels as usize + channel]
    }
}

/// Resize a frame to the model input and convert it to a blob.
///
/// Returns the resized RGB image as well, since it is the left half of the
/// composed display image.
pub fn preprocess(frame: &Frame, shape: &InputShape) -> (RgbImage, Blob) {
    let resized = if frame.width() == shape.width && frame.height() == shape.height {
        frame.image.clone()
    } else {
        imageops::resize(&frame.image, shape.width, shape.height, FilterType::Triangle)
    };
    let blob = Blob::from_rgb(&resized);
    (resized, blob)
}

// ----------------------------------------------------------------------------
// Depth rendering
// ----------------------------------------------------------------------------

/// Scale a `[0, 1]` depth map to 8-bit grayscale, saturating out-of-range values.
pub fn depth_to_gray(depth: &DepthMap) -> Result<GrayImage> {
    let pixels = depth
        .data
        .iter()
        .map(|&v| {
            let scaled = (v * DEPTH_MAX_VALUE).round();
            if scaled.is_nan() {
                0
            } else {
                scaled.clamp(0.0, DEPTH_MAX_VALUE) as u8
            }
        })
        .collect();
    GrayImage::from_raw(depth.width, depth.height, pixels).ok_or_else(|| {
        anyhow!(
            "depth buffer does not match {}x{}",
            depth.width,
            depth.height
        )
    })
}

/// Place `left` and a gray depth image next to each other.
pub fn compose_side_by_side(left: &RgbImage, depth: &GrayImage) -> Result<RgbImage> {
    if left.height() != depth.height() {
        return Err(anyhow!(
            "cannot compose frames of height {} and {}",
            left.height(),
            depth.height()
        ));
    }
    let split = left.width();
    Ok(RgbImage::from_fn(
        split + depth.width(),
        left.height(),
        |x, y| {
            if x < split {
                *left.get_pixel(x, y)
            } else {
                let Luma([g]) = *depth.get_pixel(x - split, y);
                Rgb([g, g, g])
            }
        },
    ))
}

/// Scale a depth image back to the size of the source image.
pub fn restore_size(depth: &GrayImage, width: u32, height: u32) -> GrayImage {
    if depth.width() == width && depth.height() == height {
        return depth.clone();
    }
    imageops::resize(depth, width, height, FilterType::Triangle)
}
