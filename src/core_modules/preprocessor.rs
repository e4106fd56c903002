// THEORY:
// Preprocessing normalizes a raw `Frame` into the form every detector compares:
// a single-channel intensity image smoothed with a Gaussian blur. Smoothing cancels
// single-pixel sensor noise so only spatially coherent change survives.
//
// The function is pure. It always allocates a fresh `GrayImage` and never touches
// the input frame. The kernel size is trusted: `DetectionConfig::validate` has
// already rejected even and zero sizes.

use crate::config::DetectionConfig;
use crate::core_modules::frame::Frame;
use image::GrayImage;

/// Grayscale + separable Gaussian blur.
pub fn preprocess(frame: &Frame, config: &DetectionConfig) -> GrayImage {
    let gray: Vec<u8> = frame.luminance().collect();
    let blurred = gaussian_blur(&gray, frame.width(), frame.height(), config.blur_kernel_size);
    // The buffer length is width * height by construction.
    GrayImage::from_raw(frame.width(), frame.height(), blurred)
        .unwrap_or_else(|| GrayImage::new(frame.width(), frame.height()))
}

/// Sigma OpenCV derives for a kernel of `size` when none is given.
fn default_sigma(size: u32) -> f64 {
    0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1D Gaussian weights of length `size` (odd).
fn gaussian_kernel(size: u32) -> Vec<f64> {
    let sigma = default_sigma(size);
    let radius = (size / 2) as i64;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Horizontal then vertical pass with replicated borders.
fn gaussian_blur(src: &[u8], width: u32, height: u32, size: u32) -> Vec<u8> {
    if size <= 1 {
        return src.to_vec();
    }
    let kernel = gaussian_kernel(size);
    let radius = (size / 2) as i64;
    let (w, h) = (width as i64, height as i64);

    let mut horizontal = vec![0.0_f64; src.len()];
    for y in 0..h {
        let row = (y * w) as usize;
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x + k as i64 - radius).clamp(0, w - 1) as usize;
                acc += weight * src[row + sx] as f64;
            }
            horizontal[row + x as usize] = acc;
        }
    }

    let mut out = vec![0_u8; src.len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y + k as i64 - radius).clamp(0, h - 1);
                acc += weight * horizontal[(sy * w + x) as usize];
            }
            out[(y * w + x) as usize] = acc.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
