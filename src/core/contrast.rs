use crate::types::{FusionError, FusionResult, ImageCube};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Percentile thresholds for the contrast stretch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContrastParams {
    /// Lower percentile, mapped to 0
    pub low_percentile: f64,
    /// Upper percentile, mapped to 255
    pub high_percentile: f64,
}

impl Default for ContrastParams {
    fn default() -> Self {
        Self {
            low_percentile: 2.0,
            high_percentile: 98.0,
        }
    }
}

impl ContrastParams {
    pub fn validate(&self) -> FusionResult<()> {
        let (lo, hi) = (self.low_percentile, self.high_percentile);
        if !(lo.is_finite() && hi.is_finite()) || lo < 0.0 || hi > 100.0 || lo >= hi {
            return Err(FusionError::Config(format!(
                "Percentiles must satisfy 0 <= low < high <= 100, got ({}, {})",
                lo, hi
            )));
        }
        Ok(())
    }
}

/// Percentile-based dynamic range compression to 8 bits
///
/// Each channel is clipped to its own `[p_low, p_high]` interval and
/// stretched linearly onto `[0, 255]`. When the two percentiles coincide
/// (constant channel) the output is all zeros, the same result a min/max
/// normalizer gives for a zero range.
pub struct ChannelContrastNormalizer {
    params: ContrastParams,
}

impl ChannelContrastNormalizer {
    pub fn new(params: ContrastParams) -> FusionResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Normalizer with the 2nd/98th percentile defaults
    pub fn standard() -> Self {
        Self {
            params: ContrastParams::default(),
        }
    }

    pub fn params(&self) -> &ContrastParams {
        &self.params
    }

    /// Percentile bounds of a channel over its finite samples
    pub fn percentile_bounds(&self, channel: ArrayView2<f64>) -> FusionResult<(f64, f64)> {
        self.percentile_bounds_masked(channel, None)
    }

    /// Percentile bounds over the finite samples inside `coverage`
    pub fn percentile_bounds_masked(
        &self,
        channel: ArrayView2<f64>,
        coverage: Option<ArrayView2<bool>>,
    ) -> FusionResult<(f64, f64)> {
        let mut values: Vec<f64> = match coverage {
            Some(mask) => {
                check_mask(channel.dim(), mask.dim())?;
                channel
                    .iter()
                    .zip(mask.iter())
                    .filter(|&(v, &covered)| covered && v.is_finite())
                    .map(|(&v, _)| v)
                    .collect()
            }
            None => channel.iter().copied().filter(|v| v.is_finite()).collect(),
        };
        if values.is_empty() {
            return Err(FusionError::Numeric(format!(
                "Cannot compute percentiles of a channel with no finite covered samples ({} pixels)",
                channel.len()
            )));
        }
        values.sort_unstable_by(|a, b| a.total_cmp(b));

        let low = percentile_sorted(&values, self.params.low_percentile);
        let high = percentile_sorted(&values, self.params.high_percentile);
        Ok((low, high))
    }

    /// Stretch a single channel to `[0, 255]`
    pub fn normalize_channel(&self, channel: ArrayView2<f64>) -> FusionResult<Array2<u8>> {
        self.normalize_channel_masked(channel, None)
    }

    /// Stretch a channel using only covered pixels; uncovered pixels map to 0
    pub fn normalize_channel_masked(
        &self,
        channel: ArrayView2<f64>,
        coverage: Option<ArrayView2<bool>>,
    ) -> FusionResult<Array2<u8>> {
        let (low, high) = self.percentile_bounds_masked(channel, coverage)?;
        log::debug!(
            "Contrast bounds p{}={:.3} p{}={:.3}",
            self.params.low_percentile,
            low,
            self.params.high_percentile,
            high
        );

        let range = high - low;
        if !(range > 0.0) {
            log::warn!(
                "Degenerate percentile range ({} == {}), channel maps to 0",
                low,
                high
            );
            return Ok(Array2::zeros(channel.dim()));
        }

        let scale = 255.0 / range;
        let mut output = channel.mapv(|v| {
            if !v.is_finite() {
                return 0;
            }
            let stretched = (v.clamp(low, high) - low) * scale;
            stretched.round().clamp(0.0, 255.0) as u8
        });
        if let Some(mask) = coverage {
            Zip::from(&mut output).and(mask).for_each(|out, &covered| {
                if !covered {
                    *out = 0;
                }
            });
        }
        Ok(output)
    }

    /// Stretch every band of a band-major cube independently
    pub fn normalize_color(&self, cube: ArrayView3<f64>) -> FusionResult<ImageCube> {
        self.normalize_color_masked(cube, None)
    }

    /// Stretch every band, taking percentiles over covered pixels only
    pub fn normalize_color_masked(
        &self,
        cube: ArrayView3<f64>,
        coverage: Option<ArrayView2<bool>>,
    ) -> FusionResult<ImageCube> {
        let (bands, height, width) = cube.dim();
        log::info!("Normalizing contrast of {} band(s), {}x{}", bands, width, height);

        let mut output = Array3::<u8>::zeros((bands, height, width));
        for (index, band) in cube.axis_iter(Axis(0)).enumerate() {
            let stretched = self.normalize_channel_masked(band, coverage).map_err(|e| match e {
                FusionError::Numeric(msg) => FusionError::Numeric(format!("band {}: {}", index + 1, msg)),
                other => other,
            })?;
            output.index_axis_mut(Axis(0), index).assign(&stretched);
        }
        Ok(output)
    }
}

fn check_mask(channel: (usize, usize), mask: (usize, usize)) -> FusionResult<()> {
    if channel != mask {
        return Err(FusionError::Geometry(format!(
            "Coverage mask {:?} does not match channel {:?}",
            mask, channel
        )));
    }
    Ok(())
}

/// Percentile of an ascending slice using linear interpolation between ranks
pub fn percentile_sorted(sorted: &[f64], percentile: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (percentile / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let fraction = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
        }
    }
}
