//! Image folder source.
//!
//! Scans a local folder recursively for still images and decodes them one at
//! a time, in sorted path order.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::frame::Frame;
use crate::models::find_files;

/// Extensions accepted as input images (case-insensitive).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "png", "jpeg", "bmp"];

/// A decoded input image and where it came from.
#[derive(Debug)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub frame: Frame,
}

/// Image folder source.
pub struct ImageFolderSource {
    folder: PathBuf,
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ImageFolderSource {
    /// Scan `folder` for images. Fails if `folder` is not a directory.
    pub fn scan<P: AsRef<Path>>(folder: P) -> Result<Self> {
        let folder = folder.as_ref().to_path_buf();
        if !folder.is_dir() {
            return Err(anyhow!("input folder {} does not exist", folder.display()));
        }
        let paths = find_files(&folder, IMAGE_EXTENSIONS);
        log::info!(
            "ImageFolderSource: found {} images in {}",
            paths.len(),
            folder.display()
        );
        Ok(Self {
            folder,
            paths,
            cursor: 0,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Every image path the scan found.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Iterator for ImageFolderSource {
    type Item = Result<LoadedImage>;

    /// Decode the next image. Decode failures are returned per item so the
    /// caller can skip them.
    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.get(self.cursor)?.clone();
        self.cursor += 1;
        let sequence = self.cursor as u64;
        Some(
            image::open(&path)
                .with_context(|| format!("failed to decode image {}", path.display()))
                .map(|decoded| LoadedImage {
                    frame: Frame::new(decoded.into_rgb8(), sequence),
                    path,
                }),
        )
    }
}
