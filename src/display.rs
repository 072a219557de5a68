//! Frame sinks for composed depth frames.
//!
//! A sink receives each composed (input | depth) image. `PreviewSink` keeps
//! the latest frame in a PNG file that an image viewer can watch. The file
//! is replaced by rename and never synced. `NullSink` discards frames for
//! headless benchmarking.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};

/// What the run loop should do after a frame was shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkControl {
    Continue,
    Stop,
}

pub trait FrameSink {
    fn show(&mut self, composed: &RgbImage) -> Result<SinkControl>;
}

/// Discards frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn show(&mut self, _composed: &RgbImage) -> Result<SinkControl> {
        Ok(SinkControl::Continue)
    }
}

/// Writes the latest frame to a PNG file, then waits `dwell`.
pub struct PreviewSink {
    path: PathBuf,
    dwell: Duration,
    frames_shown: u64,
}

impl PreviewSink {
    pub fn new<P: AsRef<Path>>(path: P, dwell: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        log::info!("preview frames go to {}", path.display());
        Ok(Self {
            path,
            dwell,
            frames_shown: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl FrameSink for PreviewSink {
    fn show(&mut self, composed: &RgbImage) -> Result<SinkControl> {
        let mut encoded = Cursor::new(Vec::new());
        composed
            .write_to(&mut encoded, ImageFormat::Png)
            .context("failed to encode preview frame")?;
        crate::replace_file(&self.path, encoded.get_ref())?;
        self.frames_shown += 1;
        if !self.dwell.is_zero() {
            std::thread::sleep(self.dwell);
        }
        Ok(SinkControl::Continue)
    }
}
