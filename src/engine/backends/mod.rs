use anyhow::{anyhow, Result};

use crate::frame::Blob;
use crate::{InputShape, Normalization};

pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

/// Convert an HWC blob into a normalized NCHW buffer for `shape`.
pub(crate) fn normalized_nchw(
    blob: &Blob,
    shape: &InputShape,
    normalization: &Normalization,
) -> Result<Vec<f32>> {
    if blob.width != shape.width || blob.height != shape.height || blob.channels != shape.channels
    {
        return Err(anyhow!(
            "blob {}x{}x{} does not match model input {}",
            blob.channels,
            blob.height,
            blob.width,
            shape
        ));
    }
    if blob.data.len() != shape.tensor_len() {
        return Err(anyhow!(
            "expected {} input values, received {}",
            shape.tensor_len(),
            blob.data.len()
        ));
    }

    let plane = shape.plane_len();
    let channels = shape.channels as usize;
    let mut tensor = vec![0.0f32; shape.tensor_len()];
    for (pixel, values) in blob.data.chunks_exact(channels).enumerate() {
        for (channel, &value) in values.iter().enumerate() {
            tensor[channel * plane + pixel] = normalization.apply(channel, value);
        }
    }
    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_is_transposed_and_normalized() {
        let shape = InputShape::aligned(32, 32).unwrap();
        let mut data = Vec::with_capacity(shape.tensor_len());
        for _ in 0..shape.plane_len() {
            data.extend_from_slice(&[1.0, 0.5, 0.0]);
        }
        let blob = Blob {
            data,
            width: 32,
            height: 32,
            channels: 3,
        };
        let norm = Normalization::new([0.5, 0.5, 0.5], [0.5, 0.25, 1.0]).unwrap();

        let tensor = normalized_nchw(&blob, &shape, &norm).unwrap();
        let plane = shape.plane_len();
        assert!((tensor[0] - 1.0).abs() < 1e-6);
        assert!(tensor[plane].abs() < 1e-6);
        assert!((tensor[2 * plane + 7] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn mismatched_blob_is_rejected() {
        let shape = InputShape::aligned(64, 32).unwrap();
        let blob = Blob {
            data: vec![0.0; 32 * 32 * 3],
            width: 32,
            height: 32,
            channels: 3,
        };
        assert!(normalized_nchw(&blob, &shape, &Normalization::default()).is_err());
    }
}
