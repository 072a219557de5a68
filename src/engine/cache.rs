//! Model cache manifest.
//!
//! The cache directory keeps one JSON manifest describing every
//! model/shape/device combination this harness has compiled, so a benchmark
//! run can report first-compile cost against warm runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::device::Device;
use crate::InputShape;

const MANIFEST_FILE: &str = "manifest.json";

/// One compiled model/shape/device combination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub model_path: String,
    pub device: Device,
    pub shape: InputShape,
    /// Load + optimize + warm-up time of the first compile, in milliseconds.
    pub compile_ms: u64,
    /// How many times the combination was compiled.
    pub compiles: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    entries: BTreeMap<String, CacheEntry>,
}

pub struct ModelCache {
    root: PathBuf,
    manifest: Manifest,
}

impl ModelCache {
    /// Open (and create if needed) the cache directory.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create cache dir {}", root.display()))?;
        let manifest_path = root.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            let raw = fs::read_to_string(&manifest_path)
                .with_context(|| format!("failed to read {}", manifest_path.display()))?;
            match serde_json::from_str(&raw) {
                Ok(manifest) => manifest,
                Err(err) => {
                    log::warn!(
                        "ignoring unreadable cache manifest {}: {}",
                        manifest_path.display(),
                        err
                    );
                    Manifest::default()
                }
            }
        } else {
            Manifest::default()
        };
        Ok(Self { root, manifest })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lookup(&self, key: &str) -> Option<&CacheEntry> {
        self.manifest.entries.get(key)
    }

    /// Record a compile. The first compile time of a key is kept.
    pub fn record(&mut self, key: &str, entry: CacheEntry) -> Result<CacheEntry> {
        let stored = self
            .manifest
            .entries
            .entry(key.to_string())
            .and_modify(|existing| existing.compiles += 1)
            .or_insert(CacheEntry {
                compiles: 1,
                ..entry
            })
            .clone();
        let bytes = serde_json::to_vec_pretty(&self.manifest)?;
        crate::write_atomic(&self.root.join(MANIFEST_FILE), &bytes)?;
        Ok(stored)
    }
}

/// Cache key for a model file compiled at `shape` for `device`.
///
/// Hashes the model bytes so a replaced model file gets a fresh entry.
/// Paths that are not files (e.g. `stub://`) hash the path string.
pub fn cache_key(model_path: &str, shape: &InputShape, device: Device) -> Result<String> {
    let mut hasher = Sha256::new();
    let path = Path::new(model_path);
    if path.is_file() {
        let mut file = File::open(path)
            .with_context(|| format!("failed to open model {}", path.display()))?;
        let mut buf = [0u8; 64 * 1024];
        loop {
            let read = file.read(&mut buf)?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
        }
    } else {
        hasher.update(model_path.as_bytes());
    }
    for dim in shape.dims() {
        hasher.update((dim as u64).to_le_bytes());
    }
    hasher.update(device.as_str().as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(compile_ms: u64) -> CacheEntry {
        CacheEntry {
            model_path: "stub://cache".to_string(),
            device: Device::Cpu,
            shape: InputShape::default(),
            compile_ms,
            compiles: 0,
        }
    }

    #[test]
    fn cache_keeps_first_compile_time() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut cache = ModelCache::open(dir.path().join("cache"))?;
        assert!(cache.lookup("k").is_none());

        let first = cache.record("k", entry(120))?;
        assert_eq!(first.compiles, 1);
        assert_eq!(first.compile_ms, 120);

        let second = cache.record("k", entry(5))?;
        assert_eq!(second.compiles, 2);
        assert_eq!(second.compile_ms, 120);

        let reopened = ModelCache::open(dir.path().join("cache"))?;
        assert_eq!(reopened.lookup("k"), Some(&second));
        Ok(())
    }

    #[test]
    fn cache_key_depends_on_shape_and_device() -> Result<()> {
        let small = InputShape::aligned(256, 256)?;
        let large = InputShape::aligned(512, 256)?;
        let a = cache_key("stub://m", &small, Device::Cpu)?;
        assert_eq!(a, cache_key("stub://m", &small, Device::Cpu)?);
        assert_ne!(a, cache_key("stub://m", &large, Device::Cpu)?);
        assert_ne!(a, cache_key("stub://m", &small, Device::Gpu)?);
        Ok(())
    }

    #[test]
    fn cache_key_tracks_model_contents() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let model = dir.path().join("model.onnx");
        fs::write(&model, b"first")?;
        let path = model.to_string_lossy().to_string();
        let shape = InputShape::default();
        let before = cache_key(&path, &shape, Device::Cpu)?;
        fs::write(&model, b"second")?;
        assert_ne!(before, cache_key(&path, &shape, Device::Cpu)?);
        Ok(())
    }

    #[test]
    fn corrupt_manifest_starts_fresh() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join(MANIFEST_FILE), b"{not json")?;
        let cache = ModelCache::open(dir.path())?;
        assert!(cache.lookup("anything").is_none());
        Ok(())
    }
}
