//! Pixel and sample format conversion

use crate::frame::VideoFrame;
use crate::{Error, Result, ScaleFilter};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba};

/// Convert a packed RGBA picture into the planes of a YUV 4:2:0 frame.
///
/// Uses BT.601 limited-range coefficients. Luma is computed per pixel; chroma
/// is computed from the picture downscaled to half size with `filter`. The
/// result depends only on the input and the filter.
pub fn rgba_to_yuv420(
    rgba: &[u8],
    width: u32,
    height: u32,
    filter: ScaleFilter,
    out: &mut VideoFrame,
) -> Result<()> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(Error::InvalidInput(format!(
            "expected {} bytes of RGBA for {}x{}, got {}",
            expected,
            width,
            height,
            rgba.len()
        )));
    }
    if out.width != width || out.height != height {
        return Err(Error::InvalidInput(format!(
            "output frame is {}x{}, input is {}x{}",
            out.width, out.height, width, height
        )));
    }

    let w = width as usize;
    let luma = &mut out.planes[0];
    for (dst, px) in luma.iter_mut().zip(rgba.chunks_exact(4)) {
        *dst = rgb_to_y(px[0], px[1], px[2]);
    }

    let uv_width = w.div_ceil(2);
    let uv_height = (height as usize).div_ceil(2);

    match filter {
        ScaleFilter::Box => {
            let h = height as usize;
            for y in 0..uv_height {
                for x in 0..uv_width {
                    let mut sum = [0u32; 3];
                    for dy in 0..2 {
                        for dx in 0..2 {
                            let sx = (x * 2 + dx).min(w - 1);
                            let sy = (y * 2 + dy).min(h - 1);
                            let idx = (sy * w + sx) * 4;
                            sum[0] += rgba[idx] as u32;
                            sum[1] += rgba[idx + 1] as u32;
                            sum[2] += rgba[idx + 2] as u32;
                        }
                    }
                    let (r, g, b) = (
                        ((sum[0] + 2) / 4) as u8,
                        ((sum[1] + 2) / 4) as u8,
                        ((sum[2] + 2) / 4) as u8,
                    );
                    out.planes[1][y * uv_width + x] = rgb_to_u(r, g, b);
                    out.planes[2][y * uv_width + x] = rgb_to_v(r, g, b);
                }
            }
        }
        ScaleFilter::Bilinear | ScaleFilter::Bicubic | ScaleFilter::Lanczos3 => {
            let filter_type = match filter {
                ScaleFilter::Bilinear => FilterType::Triangle,
                ScaleFilter::Lanczos3 => FilterType::Lanczos3,
                _ => FilterType::CatmullRom,
            };
            let view = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(width, height, rgba)
                .ok_or_else(|| Error::InvalidInput("RGBA buffer size mismatch".to_string()))?;
            let half = imageops::resize(&view, uv_width as u32, uv_height as u32, filter_type);

            for (i, px) in half.pixels().enumerate() {
                let [r, g, b, _] = px.0;
                out.planes[1][i] = rgb_to_u(r, g, b);
                out.planes[2][i] = rgb_to_v(r, g, b);
            }
        }
    }

    Ok(())
}

#[inline]
fn rgb_to_y(r: u8, g: u8, b: u8) -> u8 {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16).clamp(0, 255) as u8
}

#[inline]
fn rgb_to_u(r: u8, g: u8, b: u8) -> u8 {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    (((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128).clamp(0, 255) as u8
}

#[inline]
fn rgb_to_v(r: u8, g: u8, b: u8) -> u8 {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    (((112 * r - 94 * g - 18 * b + 128) >> 8) + 128).clamp(0, 255) as u8
}

/// Convert signed 16-bit samples to floats in [-1.0, 1.0)
pub fn s16_to_f32(input: &[i16], output: &mut [f32]) {
    for (dst, &src) in output.iter_mut().zip(input) {
        *dst = src as f32 / 32768.0;
    }
}

/// Reinterpret native-endian bytes as 16-bit samples without alignment requirements
pub fn s16_from_ne_bytes(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(Error::InvalidInput(format!(
            "PCM byte count must be even, got {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_ne_bytes([b[0], b[1]]))
        .collect())
}
