//! Per-frame processing: preprocess -> infer -> postprocess.

use std::time::{Duration, Instant};

use anyhow::Result;
use image::{GrayImage, RgbImage};

use crate::engine::InferEngine;
use crate::frame::{compose_side_by_side, depth_to_gray, preprocess, Frame};
use crate::Normalization;

/// Wall-clock time spent in each stage of one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameTimings {
    /// Resize, scale and tensor fill.
    pub preprocess: Duration,
    pub inference: Duration,
    /// Output fetch, depth rendering and composition.
    pub postprocess: Duration,
}

impl FrameTimings {
    pub fn total(&self) -> Duration {
        self.preprocess + self.inference + self.postprocess
    }
}

/// Everything one frame produces.
#[derive(Debug)]
pub struct ProcessedFrame {
    /// 8-bit depth visualization at model resolution.
    pub depth: GrayImage,
    /// Resized input and depth next to each other.
    pub composed: RgbImage,
    pub timings: FrameTimings,
}

pub struct DepthPipeline {
    engine: InferEngine,
    normalization: Normalization,
}

impl DepthPipeline {
    pub fn new(engine: InferEngine, normalization: Normalization) -> Self {
        Self {
            engine,
            normalization,
        }
    }

    pub fn engine(&self) -> &InferEngine {
        &self.engine
    }

    pub fn process(&mut self, frame: &Frame) -> Result<ProcessedFrame> {
        let shape = self.engine.shape();

        let start = Instant::now();
        let (resized, blob) = preprocess(frame, &shape);
        self.engine.set_input(&blob, &self.normalization)?;
        let preprocess_time = start.elapsed();

        let start = Instant::now();
        self.engine.infer()?;
        let inference_time = start.elapsed();

        let start = Instant::now();
        let depth_map = self.engine.output(true)?;
        let depth = depth_to_gray(&depth_map)?;
        let composed = compose_side_by_side(&resized, &depth)?;
        let postprocess_time = start.elapsed();

        log::debug!(
            "frame {}: preprocess {:?}, inference {:?}, postprocess {:?}",
            frame.sequence,
            preprocess_time,
            inference_time,
            postprocess_time
        );

        Ok(ProcessedFrame {
            depth,
            composed,
            timings: FrameTimings {
                preprocess: preprocess_time,
                inference: inference_time,
                postprocess: postprocess_time,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;
    use crate::engine::StubBackend;
    use crate::InputShape;
    use image::Rgb;

    fn stub_pipeline(shape: InputShape) -> DepthPipeline {
        let engine =
            InferEngine::with_backend(Box::new(StubBackend::new(shape)), shape, Device::Cpu)
                .unwrap();
        DepthPipeline::new(engine, Normalization::default())
    }

    #[test]
    fn pipeline_produces_depth_and_composite() -> Result<()> {
        let shape = InputShape::aligned(64, 32)?;
        let mut pipeline = stub_pipeline(shape);
        let image = RgbImage::from_fn(200, 100, |x, _| {
            let v = (x * 255 / 199) as u8;
            Rgb([v, v, v])
        });

        let out = pipeline.process(&Frame::new(image, 1))?;
        assert_eq!(out.depth.dimensions(), (64, 32));
        assert_eq!(out.composed.dimensions(), (128, 32));
        // Brightness gradient maps to the full depth range.
        assert_eq!(out.depth.get_pixel(0, 0)[0], 0);
        assert_eq!(out.depth.get_pixel(63, 0)[0], 255);
        assert_eq!(
            out.timings.total(),
            out.timings.preprocess + out.timings.inference + out.timings.postprocess
        );
        Ok(())
    }
}
