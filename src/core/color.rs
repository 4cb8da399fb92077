//! RGB <-> HSV conversion for 8-bit band-major images
//!
//! Hue is kept in degrees `[0, 360)`, saturation in `[0, 1]` and value on the
//! 8-bit scale `[0, 255]`, all as `f64` so hue and saturation survive a
//! brightness edit untouched.

use crate::types::{FusionError, FusionResult, ImageCube};
use ndarray::{Array2, Array3};

#[derive(Debug, Clone, PartialEq)]
pub struct HsvImage {
    pub hue: Array2<f64>,
    pub saturation: Array2<f64>,
    pub value: Array2<f64>,
}

impl HsvImage {
    /// Convert a 3-band RGB image
    pub fn from_rgb(image: &ImageCube) -> FusionResult<Self> {
        let (bands, rows, cols) = image.dim();
        if bands != 3 {
            return Err(FusionError::Geometry(format!(
                "Expected a 3-band RGB image, got {} band(s)",
                bands
            )));
        }

        let mut hue = Array2::<f64>::zeros((rows, cols));
        let mut saturation = Array2::<f64>::zeros((rows, cols));
        let mut value = Array2::<f64>::zeros((rows, cols));

        for i in 0..rows {
            for j in 0..cols {
                let (h, s, v) = rgb_to_hsv(image[[0, i, j]], image[[1, i, j]], image[[2, i, j]]);
                hue[[i, j]] = h;
                saturation[[i, j]] = s;
                value[[i, j]] = v;
            }
        }

        Ok(Self {
            hue,
            saturation,
            value,
        })
    }

    pub fn dim(&self) -> (usize, usize) {
        self.value.dim()
    }

    /// Same hue and saturation with a replacement value channel
    pub fn with_value(&self, value: Array2<f64>) -> FusionResult<Self> {
        if value.dim() != self.dim() {
            return Err(FusionError::Geometry(format!(
                "Value channel {:?} does not match image {:?}",
                value.dim(),
                self.dim()
            )));
        }
        Ok(Self {
            hue: self.hue.clone(),
            saturation: self.saturation.clone(),
            value,
        })
    }

    /// Back to 3-band RGB, rounding each channel
    pub fn to_rgb(&self) -> ImageCube {
        let (rows, cols) = self.dim();
        let mut image = Array3::<u8>::zeros((3, rows, cols));
        for i in 0..rows {
            for j in 0..cols {
                let (r, g, b) = hsv_to_rgb(self.hue[[i, j]], self.saturation[[i, j]], self.value[[i, j]]);
                image[[0, i, j]] = r;
                image[[1, i, j]] = g;
                image[[2, i, j]] = b;
            }
        }
        image
    }
}

pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max > 0.0 { delta / max } else { 0.0 };

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    (hue.rem_euclid(360.0), saturation, max)
}

pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> (u8, u8, u8) {
    let chroma = value * saturation;
    let sector = hue.rem_euclid(360.0) / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());

    let (r1, g1, b1) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };

    let m = value - chroma;
    let to_u8 = |c: f64| (c + m).round().clamp(0.0, 255.0) as u8;
    (to_u8(r1), to_u8(g1), to_u8(b1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_primary_colors() {
        let (h, s, v) = rgb_to_hsv(255, 0, 0);
        assert_relative_eq!(h, 0.0);
        assert_relative_eq!(s, 1.0);
        assert_relative_eq!(v, 255.0);

        let (h, _, _) = rgb_to_hsv(0, 255, 0);
        assert_relative_eq!(h, 120.0);

        let (h, _, _) = rgb_to_hsv(0, 0, 255);
        assert_relative_eq!(h, 240.0);

        let (h, s, v) = rgb_to_hsv(128, 128, 128);
        assert_relative_eq!(h, 0.0);
        assert_relative_eq!(s, 0.0);
        assert_relative_eq!(v, 128.0);
    }

    #[test]
    fn test_rgb_roundtrip_is_exact() {
        for &(r, g, b) in &[(50u8, 100u8, 150u8), (200, 30, 90), (0, 0, 0), (255, 255, 255), (17, 250, 3)] {
            let (h, s, v) = rgb_to_hsv(r, g, b);
            assert_eq!(hsv_to_rgb(h, s, v), (r, g, b));
        }
    }

    #[test]
    fn test_image_conversion_requires_three_bands() {
        let image = Array3::<u8>::zeros((1, 2, 2));
        assert!(matches!(HsvImage::from_rgb(&image), Err(FusionError::Geometry(_))));
    }

    #[test]
    fn test_with_value_keeps_hue_and_saturation() {
        let mut image = Array3::<u8>::zeros((3, 2, 2));
        image.fill(90);
        image[[0, 0, 0]] = 200;
        let hsv = HsvImage::from_rgb(&image).unwrap();
        let darker = hsv.with_value(hsv.value.mapv(|v| v / 2.0)).unwrap();

        assert_eq!(darker.hue, hsv.hue);
        assert_eq!(darker.saturation, hsv.saturation);
        assert_relative_eq!(darker.value[[0, 0]], 100.0);
    }
}
