use anyhow::{anyhow, Result};

/// Pixel layouts a capture device may deliver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Yuyv,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"YUYV" => Some(PixelFormat::Yuyv),
            _ => None,
        }
    }

    fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Yuyv => 2,
        }
    }
}

/// Convert one captured buffer to packed RGB24.
///
/// `stride` is the driver's bytes per line; 0 means rows are packed. Row
/// padding and trailing bytes are dropped. Short buffers are rejected.
pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    let row_len = (width as usize)
        .checked_mul(format.bytes_per_pixel())
        .ok_or_else(|| anyhow!("{:?} frame dimensions overflow", format))?;
    let stride = if stride == 0 { row_len } else { stride as usize };
    if stride < row_len {
        return Err(anyhow!(
            "{:?} stride {} is shorter than a {} pixel row",
            format,
            stride,
            width
        ));
    }
    let height = height as usize;
    let expected = match height {
        0 => 0,
        h => stride
            .checked_mul(h - 1)
            .and_then(|len| len.checked_add(row_len))
            .ok_or_else(|| anyhow!("{:?} frame dimensions overflow", format))?,
    };
    if pixels.len() < expected {
        return Err(anyhow!(
            "{:?} frame too short: expected {}, got {}",
            format,
            expected,
            pixels.len()
        ));
    }

    let mut packed = Vec::with_capacity(row_len * height);
    for row in 0..height {
        let start = row * stride;
        packed.extend_from_slice(&pixels[start..start + row_len]);
    }
    match format {
        PixelFormat::Rgb24 => Ok(packed),
        PixelFormat::Yuyv => Ok(yuyv_to_rgb(&packed)),
    }
}

fn yuyv_to_rgb(pixels: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.len() / 2 * 3);
    for chunk in pixels.chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for y in [chunk[0], chunk[2]] {
            let y = y as f32;
            rgb.push(clamp_to_u8(y + 1.402_f32 * v));
            rgb.push(clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v));
            rgb.push(clamp_to_u8(y + 1.772_f32 * u));
        }
    }
    rgb
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
