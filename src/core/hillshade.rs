use crate::types::{FusionError, FusionResult};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Sun position and grid spacing for hillshading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HillshadeParams {
    /// Sun azimuth in degrees
    pub azimuth_deg: f64,
    /// Sun altitude above the horizon in degrees
    pub altitude_deg: f64,
    /// Grid spacing (col, row) used for the gradient
    pub pixel_spacing: (f64, f64),
}

impl Default for HillshadeParams {
    fn default() -> Self {
        Self {
            azimuth_deg: 315.0,
            altitude_deg: 45.0,
            pixel_spacing: (1.0, 1.0),
        }
    }
}

impl HillshadeParams {
    pub fn validate(&self) -> FusionResult<()> {
        if !self.azimuth_deg.is_finite() {
            return Err(FusionError::Config(format!(
                "Sun azimuth must be finite, got {}",
                self.azimuth_deg
            )));
        }
        if !(0.0..=90.0).contains(&self.altitude_deg) {
            return Err(FusionError::Config(format!(
                "Sun altitude must lie in [0, 90] degrees, got {}",
                self.altitude_deg
            )));
        }
        let (sx, sy) = self.pixel_spacing;
        if !(sx.is_finite() && sy.is_finite()) || sx <= 0.0 || sy <= 0.0 {
            return Err(FusionError::Config(format!(
                "Pixel spacing must be positive, got ({}, {})",
                sx, sy
            )));
        }
        Ok(())
    }
}

/// Relative illumination in `[0, 1]` with a validity mask
#[derive(Debug, Clone, PartialEq)]
pub struct HillshadeField {
    pub values: Array2<f64>,
    /// False where the elevation stencil touched no-data
    pub valid: Array2<bool>,
}

impl HillshadeField {
    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn valid_fraction(&self) -> f64 {
        if self.valid.is_empty() {
            return 0.0;
        }
        self.valid.iter().filter(|&&v| v).count() as f64 / self.valid.len() as f64
    }
}

/// Sun-angle hillshade of an elevation surface
pub struct HillshadeCalculator {
    params: HillshadeParams,
}

impl HillshadeCalculator {
    pub fn new(params: HillshadeParams) -> FusionResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Calculator with azimuth 315 and altitude 45
    pub fn standard() -> Self {
        Self {
            params: HillshadeParams::default(),
        }
    }

    pub fn params(&self) -> &HillshadeParams {
        &self.params
    }

    /// Hillshade of a surface without no-data
    pub fn compute(&self, elevation: ArrayView2<f64>) -> HillshadeField {
        self.compute_masked(elevation, None)
    }

    /// Hillshade with pixels touching `nodata` (or NaN) masked out
    ///
    /// Masked pixels hold 0 and are excluded from the min/max normalization.
    /// A flat surface has zero range; it is then reported as its raw
    /// illumination, `sin(altitude)`, so the field stays uniform.
    pub fn compute_masked(&self, elevation: ArrayView2<f64>, nodata: Option<f64>) -> HillshadeField {
        let (rows, cols) = elevation.dim();
        let mut values = Array2::<f64>::zeros((rows, cols));
        let mut valid = Array2::<bool>::from_elem((rows, cols), false);

        let is_valid = |v: f64| !v.is_nan() && nodata.map_or(true, |nd| v != nd);

        let altitude = self.params.altitude_deg.to_radians();
        let azimuth = self.params.azimuth_deg.to_radians();
        let (sin_alt, cos_alt) = altitude.sin_cos();
        let (dx_scale, dy_scale) = self.params.pixel_spacing;

        for i in 0..rows {
            for j in 0..cols {
                let (r0, r1) = stencil(i, rows);
                let (c0, c1) = stencil(j, cols);

                let samples = [
                    elevation[[r0, j]],
                    elevation[[r1, j]],
                    elevation[[i, c0]],
                    elevation[[i, c1]],
                    elevation[[i, j]],
                ];
                if !samples.iter().all(|&v| is_valid(v)) {
                    continue;
                }

                let dz_drow = gradient(elevation[[r0, j]], elevation[[r1, j]], r1 - r0, dy_scale);
                let dz_dcol = gradient(elevation[[i, c0]], elevation[[i, c1]], c1 - c0, dx_scale);

                // Slope is measured from horizontal. The usual written form
                // sin(alt)·sin(slope) + cos(alt)·cos(slope)·cos(az − aspect)
                // expects slope from vertical, so it is applied to the
                // complement: flat ground gets sin(alt) and sun-facing slopes
                // are brighter.
                let slope = dz_drow.hypot(dz_dcol).atan();
                let aspect = (-dz_drow).atan2(dz_dcol);
                let incidence = FRAC_PI_2 - slope;

                values[[i, j]] = sin_alt * incidence.sin()
                    + cos_alt * incidence.cos() * ((azimuth - FRAC_PI_2) - aspect).cos();
                valid[[i, j]] = true;
            }
        }

        normalize_field(&mut values, &valid);

        let field = HillshadeField { values, valid };
        if field.valid_fraction() < 1.0 {
            log::debug!(
                "Hillshade masked {:.1}% of pixels",
                (1.0 - field.valid_fraction()) * 100.0
            );
        }
        field
    }
}

/// Neighbour indices for the gradient: central inside, one-sided on edges
fn stencil(index: usize, len: usize) -> (usize, usize) {
    if len < 2 {
        (index, index)
    } else if index == 0 {
        (0, 1)
    } else if index == len - 1 {
        (len - 2, len - 1)
    } else {
        (index - 1, index + 1)
    }
}

fn gradient(before: f64, after: f64, steps: usize, spacing: f64) -> f64 {
    if steps == 0 {
        0.0
    } else {
        (after - before) / (steps as f64 * spacing)
    }
}

/// Min/max stretch of the valid pixels onto `[0, 1]`
fn normalize_field(values: &mut Array2<f64>, valid: &Array2<bool>) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for (&v, &ok) in values.iter().zip(valid.iter()) {
        if ok {
            min = min.min(v);
            max = max.max(v);
        }
    }

    if !min.is_finite() {
        log::warn!("Hillshade has no valid pixels");
        return;
    }

    let range = max - min;
    log::debug!("Raw illumination range [{:.4}, {:.4}]", min, max);

    for (v, &ok) in values.iter_mut().zip(valid.iter()) {
        if !ok {
            *v = 0.0;
        } else if range > 1e-12 {
            *v = ((*v - min) / range).clamp(0.0, 1.0);
        } else {
            *v = v.clamp(0.0, 1.0);
        }
    }
}
