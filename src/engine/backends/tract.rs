#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::device::Device;
use crate::engine::backend::DepthBackend;
use crate::engine::depth::DepthMap;
use crate::frame::Blob;
use crate::{InputShape, Normalization};

use super::normalized_nchw;

/// Tract-based backend for ONNX depth models.
///
/// The model input is pinned to `1 x C x H x W` before optimization, so the
/// plan is compiled once for the chosen resolution. Tract executes on the CPU
/// only.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    shape: InputShape,
    input: Option<Tensor>,
    output: Option<Tensor>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, shape: InputShape) -> Result<Self> {
        let model_path = model_path.as_ref();
        let [n, c, h, w] = shape.dims();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), tvec!(n, c, h, w)))
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            shape,
            input: None,
            output: None,
        })
    }

    fn run(&self, input: Tensor) -> Result<Tensor> {
        let mut outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        if outputs.is_empty() {
            return Err(anyhow!("model produced no outputs"));
        }
        Ok(outputs.remove(0).into_tensor())
    }
}

impl DepthBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn supported_devices(&self) -> &'static [Device] {
        &[Device::Cpu]
    }

    fn set_input(&mut self, blob: &Blob, normalization: &Normalization) -> Result<()> {
        let data = normalized_nchw(blob, &self.shape, normalization)?;
        let [n, c, h, w] = self.shape.dims();
        let input = tract_ndarray::Array4::from_shape_vec((n, c, h, w), data)
            .context("failed to shape input tensor")?;
        self.input = Some(input.into_tensor());
        Ok(())
    }

    fn infer(&mut self) -> Result<()> {
        let input = self
            .input
            .clone()
            .ok_or_else(|| anyhow!("no input tensor set before inference"))?;
        self.output = Some(self.run(input)?);
        Ok(())
    }

    fn output(&self) -> Result<DepthMap> {
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| anyhow!("no output available; run inference first"))?;
        let values = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let data: Vec<f32> = values.iter().copied().collect();
        if data.len() != self.shape.plane_len() {
            return Err(anyhow!(
                "model output has {} values ({:?}), expected {}x{}",
                data.len(),
                output.shape(),
                self.shape.height,
                self.shape.width
            ));
        }
        Ok(DepthMap {
            data,
            width: self.shape.width,
            height: self.shape.height,
        })
    }

    fn warm_up(&mut self) -> Result<()> {
        let zeros = Tensor::zero::<f32>(&self.shape.dims()).context("allocate warm-up tensor")?;
        self.run(zeros).map(|_| ())
    }
}
