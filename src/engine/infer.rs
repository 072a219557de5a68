use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::device::{resolve_device, Device};
use crate::engine::backend::DepthBackend;
use crate::engine::backends::StubBackend;
use crate::engine::cache::{cache_key, CacheEntry, ModelCache};
use crate::engine::depth::DepthMap;
use crate::frame::Blob;
use crate::{InputShape, Normalization};

/// Model paths with this prefix select the synthetic stub backend.
pub const STUB_MODEL_SCHEME: &str = "stub://";

/// Everything needed to build an engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub model_path: String,
    pub cache_dir: PathBuf,
    pub device: Device,
    pub shape: InputShape,
}

/// Inference engine adapter.
///
/// Wraps one backend compiled for a fixed input shape and device and exposes
/// the synchronous `set_input` / `infer` / `output` cycle.
pub struct InferEngine {
    backend: Box<dyn DepthBackend>,
    shape: InputShape,
    device: Device,
    compile_time: Duration,
    cache_entry: CacheEntry,
    input_ready: bool,
}

impl InferEngine {
    /// Load the model, compile it for the configured shape and warm it up.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let mut cache = ModelCache::open(&config.cache_dir)?;

        let start = Instant::now();
        let mut backend = open_backend(&config)?;
        let device = resolve_device(config.device, backend.supported_devices(), backend.name())?;
        backend.warm_up()?;
        let compile_time = start.elapsed();

        let key = cache_key(&config.model_path, &config.shape, device)?;
        if let Some(previous) = cache.lookup(&key) {
            log::info!(
                "model compiled before for {} {} (first compile {} ms, {} compiles)",
                previous.device,
                previous.shape,
                previous.compile_ms,
                previous.compiles
            );
        }
        let cache_entry = cache.record(
            &key,
            CacheEntry {
                model_path: config.model_path.clone(),
                device,
                shape: config.shape,
                compile_ms: compile_time.as_millis() as u64,
                compiles: 0,
            },
        )?;
        log::info!(
            "{} backend ready on {} in {} ms (cache {})",
            backend.name(),
            device,
            compile_time.as_millis(),
            cache.root().display()
        );

        Ok(Self {
            backend,
            shape: config.shape,
            device,
            compile_time,
            cache_entry,
            input_ready: false,
        })
    }

    /// Wrap an already constructed backend. No cache bookkeeping is done.
    pub fn with_backend(
        backend: Box<dyn DepthBackend>,
        shape: InputShape,
        requested: Device,
    ) -> Result<Self> {
        let device = resolve_device(requested, backend.supported_devices(), backend.name())?;
        Ok(Self {
            cache_entry: CacheEntry {
                model_path: backend.name().to_string(),
                device,
                shape,
                compile_ms: 0,
                compiles: 0,
            },
            backend,
            shape,
            device,
            compile_time: Duration::ZERO,
            input_ready: false,
        })
    }

    /// Load a preprocessed frame into the input blob.
    pub fn set_input(&mut self, blob: &Blob, normalization: &Normalization) -> Result<()> {
        self.backend.set_input(blob, normalization)?;
        self.input_ready = true;
        Ok(())
    }

    /// Run inference synchronously on the current input.
    pub fn infer(&mut self) -> Result<()> {
        if !self.input_ready {
            return Err(anyhow!("inference requested before any input was set"));
        }
        self.backend.infer()
    }

    /// Fetch the output depth buffer, optionally min-max normalized to `[0, 1]`.
    pub fn output(&self, normalize: bool) -> Result<DepthMap> {
        let depth = self.backend.output()?;
        Ok(if normalize { depth.normalized() } else { depth })
    }

    pub fn shape(&self) -> InputShape {
        self.shape
    }

    /// Device the backend actually runs on.
    pub fn device(&self) -> Device {
        self.device
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn compile_time(&self) -> Duration {
        self.compile_time
    }

    pub fn cache_entry(&self) -> &CacheEntry {
        &self.cache_entry
    }
}

fn open_backend(config: &EngineConfig) -> Result<Box<dyn DepthBackend>> {
    if config.model_path.starts_with(STUB_MODEL_SCHEME) {
        log::info!("using stub backend for {}", config.model_path);
        return Ok(Box::new(StubBackend::new(config.shape)));
    }

    let path = Path::new(&config.model_path);
    if !path.is_file() {
        return Err(anyhow!("model file {} does not exist", path.display()));
    }

    #[cfg(feature = "backend-tract")]
    {
        Ok(Box::new(crate::engine::backends::TractBackend::new(
            path,
            config.shape,
        )?))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        Err(anyhow!(
            "loading {} requires the backend-tract feature",
            path.display()
        ))
    }
}
