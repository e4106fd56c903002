// THEORY:
// A `ForegroundMask` is the binary output of a detector: one flag per processed
// pixel, `true` where the pixel deviates from whatever the detector treats as
// background. Masks are produced fresh for every frame and thrown away once the
// region extractor has read them.
//
// Morphology lives here because both detectors need it. Dilation merges nearby
// fragments of one moving object; erosion followed by dilation (an opening)
// removes isolated speckle. Both use a 3x3 square structuring element and treat
// out-of-bounds neighbours as absent.

use image::{GrayImage, Luma};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl ForegroundMask {
    /// An all-background mask.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Builds a mask by evaluating `f(x, y)` for every pixel, row-major.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut bits = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                bits.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            bits,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.bits[i] = value;
        }
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|&b| b)
    }

    /// Renders the mask as a 0/255 image, e.g. for an overlay.
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.get(x, y) { 255 } else { 0 }])
        })
    }

    /// `iterations` passes of 3x3 dilation.
    pub fn dilate(&mut self, iterations: u32) {
        for _ in 0..iterations {
            self.bits = self.neighbourhood_pass(|any, _all| any);
        }
    }

    /// `iterations` passes of 3x3 erosion.
    pub fn erode(&mut self, iterations: u32) {
        for _ in 0..iterations {
            self.bits = self.neighbourhood_pass(|_any, all| all);
        }
    }

    /// One erosion followed by one dilation.
    pub fn open(&mut self) {
        self.erode(1);
        self.dilate(1);
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Applies `rule(any_set, all_set)` over each pixel's in-bounds 3x3 neighbourhood.
    fn neighbourhood_pass(&self, rule: impl Fn(bool, bool) -> bool) -> Vec<bool> {
        let (w, h) = (self.width as i64, self.height as i64);
        let mut out = Vec::with_capacity(self.bits.len());
        for y in 0..h {
            for x in 0..w {
                let mut any = false;
                let mut all = true;
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let (nx, ny) = (x + dx, y + dy);
                        if nx < 0 || nx >= w || ny < 0 || ny >= h {
                            continue;
                        }
                        let set = self.bits[(ny * w + nx) as usize];
                        any |= set;
                        all &= set;
                    }
                }
                out.push(rule(any, all));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dilation_grows_a_point_into_a_square() {
        let mut mask = ForegroundMask::empty(7, 7);
        mask.set(3, 3, true);
        mask.dilate(1);
        assert_eq!(mask.count(), 9);
        mask.dilate(1);
        assert_eq!(mask.count(), 25);
        assert!(mask.get(1, 1));
        assert!(!mask.get(0, 0));
    }

    #[test]
    fn opening_removes_speckle_but_keeps_blocks() {
        let mut mask = ForegroundMask::from_fn(12, 12, |x, y| (2..7).contains(&x) && (2..7).contains(&y));
        mask.set(10, 10, true);
        mask.open();
        assert!(!mask.get(10, 10));
        assert_eq!(mask.count(), 25);
    }

    #[test]
    fn empty_mask_reports_empty() {
        let mask = ForegroundMask::empty(4, 3);
        assert!(mask.is_empty());
        assert_eq!(mask.to_image().dimensions(), (4, 3));
    }
}
