//! Frame ingestion sources.
//!
//! This module provides the two sources a benchmark run can read from:
//! - Camera capture (synthetic `stub://` cameras, V4L2 devices with feature `ingest-v4l2`)
//! - Image folders (recursive scan for jpg/jpeg/png/bmp files)
//!
//! All sources produce RGB8 `Frame` instances. Frames are handed to the
//! pipeline one at a time and dropped after processing.

pub mod camera;
pub mod folder;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
#[cfg(feature = "ingest-v4l2")]
mod v4l2;

pub use camera::{CameraConfig, CameraSource, CameraStats};
pub use folder::{ImageFolderSource, LoadedImage, IMAGE_EXTENSIONS};
