use anyhow::{anyhow, Result};

use crate::device::Device;
use crate::engine::backend::DepthBackend;
use crate::engine::depth::DepthMap;
use crate::frame::Blob;
use crate::{InputShape, Normalization};

use super::normalized_nchw;

/// Stub backend for testing and dry runs.
///
/// Produces a synthetic depth map equal to the per-pixel channel mean of the
/// normalized input, so brighter regions read as farther away.
pub struct StubBackend {
    shape: InputShape,
    input: Option<Vec<f32>>,
    output: Option<Vec<f32>>,
    runs: u64,
}

impl StubBackend {
    pub fn new(shape: InputShape) -> Self {
        Self {
            shape,
            input: None,
            output: None,
            runs: 0,
        }
    }

    /// Number of completed `infer` calls, warm-up excluded.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    fn channel_mean(&self, input: &[f32]) -> Vec<f32> {
        let plane = self.shape.plane_len();
        let channels = self.shape.channels as usize;
        (0..plane)
            .map(|pixel| {
                let sum: f32 = (0..channels).map(|c| input[c * plane + pixel]).sum();
                sum / channels as f32
            })
            .collect()
    }
}

impl DepthBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supported_devices(&self) -> &'static [Device] {
        &Device::ALL
    }

    fn set_input(&mut self, blob: &Blob, normalization: &Normalization) -> Result<()> {
        self.input = Some(normalized_nchw(blob, &self.shape, normalization)?);
        Ok(())
    }

    fn infer(&mut self) -> Result<()> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| anyhow!("stub backend has no input"))?;
        self.output = Some(self.channel_mean(input));
        self.runs += 1;
        Ok(())
    }

    fn output(&self) -> Result<DepthMap> {
        let data = self
            .output
            .clone()
            .ok_or_else(|| anyhow!("stub backend has no output; run inference first"))?;
        Ok(DepthMap {
            data,
            width: self.shape.width,
            height: self.shape.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_blob(shape: &InputShape) -> Blob {
        let mut data = Vec::with_capacity(shape.tensor_len());
        for y in 0..shape.height {
            for x in 0..shape.width {
                let v = (x + y) as f32 / (shape.width + shape.height) as f32;
                data.extend_from_slice(&[v, v, v]);
            }
        }
        Blob {
            data,
            width: shape.width,
            height: shape.height,
            channels: 3,
        }
    }

    #[test]
    fn stub_requires_input_before_inference() {
        let mut backend = StubBackend::new(InputShape::default());
        assert!(backend.infer().is_err());
        assert!(backend.output().is_err());
    }

    #[test]
    fn stub_output_follows_brightness() {
        let shape = InputShape::aligned(32, 32).unwrap();
        let mut backend = StubBackend::new(shape);
        let identity = Normalization::new([0.0; 3], [1.0; 3]).unwrap();

        backend.set_input(&gradient_blob(&shape), &identity).unwrap();
        backend.infer().unwrap();
        let depth = backend.output().unwrap();

        assert_eq!(depth.len(), shape.plane_len());
        assert!(depth.data[0] < depth.data[depth.len() - 1]);
        assert_eq!(backend.runs(), 1);
    }
}
