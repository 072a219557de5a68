//! Camera frame source.
//!
//! `CameraSource` wraps either a synthetic camera (`stub://` device paths,
//! used by tests and dry runs) or a V4L2 device (feature `ingest-v4l2`).
//! The source is responsible for:
//! - Opening the device at the requested capture size
//! - Capturing frames in-memory
//! - Normalizing the device pixel format to RGB8
//! - Producing `Frame` instances

use anyhow::Result;
#[cfg(not(feature = "ingest-v4l2"))]
use anyhow::anyhow;

use crate::frame::Frame;
#[cfg(feature = "ingest-v4l2")]
use super::v4l2::V4l2Camera;

/// Capture request used when the configuration does not name one.
pub const DEFAULT_CAPTURE_WIDTH: u32 = 1280;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 720;

/// Configuration for a camera source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or "stub://<name>".
    pub device: String,
    /// Requested capture width. The device may choose another size.
    pub width: u32,
    /// Requested capture height.
    pub height: u32,
    /// Requested frame rate; 0 leaves the device default.
    pub target_fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
            target_fps: 30,
        }
    }
}

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(V4l2Camera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.device.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            });
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(V4l2Camera::new(config)),
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(anyhow!(
                "camera {} requires the ingest-v4l2 feature",
                config.device
            ))
        }
    }

    /// Open the camera.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    /// Capture the next frame. Blocks until the device delivers one.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(_) => true,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub device: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        log::info!(
            "CameraSource: connected to {} (synthetic, {}x{})",
            self.config.device,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        Frame::from_rgb_bytes(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
    }

    /// Horizontal gradient that drifts one column per frame.
    fn generate_synthetic_pixels(&self) -> Vec<u8> {
        let width = (self.config.width as u64).max(1);
        let mut pixels = Vec::with_capacity((self.config.width * self.config.height * 3) as usize);
        for y in 0..self.config.height as u64 {
            for x in 0..width {
                let shade = (((x + self.frame_count) % width) * 255 / width) as u8;
                pixels.extend_from_slice(&[shade, (y % 256) as u8, 255 - shade]);
            }
        }
        pixels
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            width: 64,
            height: 48,
            target_fps: 10,
        }
    }

    #[test]
    fn synthetic_camera_produces_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;

        let frame = source.next_frame()?;
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(frame.sequence, 1);
        assert!(source.is_healthy());

        Ok(())
    }

    #[test]
    fn synthetic_frames_change_over_time() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;

        let frame1 = source.next_frame()?;
        let frame2 = source.next_frame()?;
        assert_ne!(frame1.image.as_raw(), frame2.image.as_raw());
        assert_eq!(source.stats().frames_captured, 2);

        Ok(())
    }

    #[test]
    fn synthetic_gradient_wraps_instead_of_overflowing() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;

        // Drift the gradient past the full width.
        for _ in 0..70 {
            source.next_frame()?;
        }
        let frame = source.next_frame()?;
        // 71 frames in, column 0 shows (71 % 64) * 255 / 64.
        let expected = ((71 % 64) * 255 / 64) as u8;
        assert_eq!(frame.image.get_pixel(0, 0)[0], expected);
        // Column 57 wraps back to the dark end of the ramp.
        assert_eq!(frame.image.get_pixel(57, 0)[0], 0);
        let row: Vec<u8> = (0..64).map(|x| frame.image.get_pixel(x, 0)[0]).collect();
        assert_eq!(row.iter().filter(|&&shade| shade == 0).count(), 1);

        Ok(())
    }

    #[test]
    fn default_request_is_720p() {
        let config = CameraConfig::default();
        assert_eq!((config.width, config.height), (1280, 720));
    }
}
