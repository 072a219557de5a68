use anyhow::Result;

use crate::device::Device;
use crate::engine::depth::DepthMap;
use crate::frame::Blob;
use crate::Normalization;

/// Depth inference backend trait.
///
/// A backend owns a loaded model with a fixed input shape. The engine drives
/// it through three synchronous steps per frame: `set_input`, `infer`,
/// `output`. Backends keep the last input and output between calls; nothing
/// is retained across process runs except through the engine's model cache.
pub trait DepthBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Devices this backend can execute on.
    fn supported_devices(&self) -> &'static [Device];

    /// Load a preprocessed blob into the input tensor.
    ///
    /// The blob is HWC RGB in `[0, 1]`; the backend applies `normalization`
    /// per channel while laying it out as NCHW.
    fn set_input(&mut self, blob: &Blob, normalization: &Normalization) -> Result<()>;

    /// Run inference on the current input.
    fn infer(&mut self) -> Result<()>;

    /// Raw output of the last `infer` call, one value per input pixel.
    fn output(&self) -> Result<DepthMap>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
