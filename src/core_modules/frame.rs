// THEORY:
// The `Frame` is the raw unit of input: a "dumb" container for one captured image.
// It knows its own geometry and how to reduce a single pixel to an intensity, and
// nothing else. It never compares itself with other frames; that is the job of the
// detectors further down the pipeline.
//
// Frames arrive interleaved (gray, RGB or RGBA, 8 bits per channel). Geometry is
// checked once, when the frame is built, so later stages can index the buffer
// without re-validating it.

use crate::error::InputError;
use image::DynamicImage;

/// A captured camera frame with interleaved 8-bit channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl Frame {
    /// Wraps a raw buffer after checking it matches `width * height * channels`.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, InputError> {
        if width == 0 || height == 0 {
            return Err(InputError::EmptyFrame);
        }
        if !matches!(channels, 1 | 3 | 4) {
            return Err(InputError::UnsupportedChannels(channels));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(InputError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// (width, height, channels), the session-fixed geometry key.
    pub fn geometry(&self) -> (u32, u32, u8) {
        (self.width, self.height, self.channels)
    }

    /// Rec. 601 luminance of every pixel, in row-major order. Alpha is ignored.
    pub fn luminance(&self) -> impl Iterator<Item = u8> + '_ {
        self.data
            .chunks_exact(self.channels as usize)
            .map(|px| match px {
                [gray] => *gray,
                [r, g, b, ..] => luminance(*r, *g, *b),
                _ => 0,
            })
    }
}

/// Rec. 601 luma, rounded to the nearest integer.
pub fn luminance(red: u8, green: u8, blue: u8) -> u8 {
    let luma = 0.299_f64 * red as f64 + 0.587_f64 * green as f64 + 0.114_f64 * blue as f64;
    luma.round().clamp(0.0, 255.0) as u8
}

impl From<&DynamicImage> for Frame {
    fn from(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => Self {
                width: gray.width(),
                height: gray.height(),
                channels: 1,
                data: gray.as_raw().clone(),
            },
            DynamicImage::ImageRgba8(rgba) => Self {
                width: rgba.width(),
                height: rgba.height(),
                channels: 4,
                data: rgba.as_raw().clone(),
            },
            other => {
                let rgb = other.to_rgb8();
                Self {
                    width: rgb.width(),
                    height: rgb.height(),
                    channels: 3,
                    data: rgb.into_raw(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage};

    #[test]
    fn rejects_malformed_buffers() {
        assert_eq!(Frame::new(0, 4, 1, vec![]), Err(InputError::EmptyFrame));
        assert_eq!(
            Frame::new(2, 2, 2, vec![0; 8]),
            Err(InputError::UnsupportedChannels(2))
        );
        assert_eq!(
            Frame::new(4, 4, 3, vec![0; 47]),
            Err(InputError::BufferSizeMismatch { expected: 48, actual: 47 })
        );
    }

    #[test]
    fn luminance_uses_rec601_weights() {
        assert_eq!(luminance(255, 255, 255), 255);
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(255, 0, 0), 76);
        assert_eq!(luminance(0, 255, 0), 150);
        assert_eq!(luminance(0, 0, 255), 29);
    }

    #[test]
    fn converts_from_dynamic_images() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 2, image::Luma([9])));
        let frame = Frame::from(&gray);
        assert_eq!(frame.geometry(), (3, 2, 1));
        assert!(frame.luminance().all(|v| v == 9));

        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, image::Rgb([255, 0, 0])));
        let frame = Frame::from(&rgb);
        assert_eq!(frame.geometry(), (2, 2, 3));
        assert!(frame.luminance().all(|v| v == 76));
    }
}
