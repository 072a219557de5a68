mod backend;
mod backends;
mod cache;
mod depth;
mod infer;

pub use backend::DepthBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use cache::{CacheEntry, ModelCache};
pub use depth::DepthMap;
pub use infer::{EngineConfig, InferEngine, STUB_MODEL_SCHEME};
