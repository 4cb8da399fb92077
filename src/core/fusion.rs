use crate::core::color::HsvImage;
use crate::core::hillshade::{HillshadeCalculator, HillshadeParams};
use crate::types::{FusionError, FusionResult, ImageCube};
use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

/// How elevation is injected into the color image's brightness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FusionStrategy {
    /// Replace brightness with the min/max-scaled elevation
    #[deprecated(note = "discards original brightness and distorts color on bright or dark terrain; use HillshadeModulation")]
    DirectSubstitution,
    /// Multiply brightness by `hillshade + ambient_light`
    #[default]
    HillshadeModulation,
}

/// Parameters for the fusion renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionParams {
    pub strategy: FusionStrategy,
    pub hillshade: HillshadeParams,
    /// Floor added to the hillshade so shadows never go fully black
    pub ambient_light: f64,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            strategy: FusionStrategy::default(),
            hillshade: HillshadeParams::default(),
            ambient_light: 0.5,
        }
    }
}

impl FusionParams {
    pub fn validate(&self) -> FusionResult<()> {
        self.hillshade.validate()?;
        if !self.ambient_light.is_finite() || self.ambient_light < 0.0 {
            return Err(FusionError::Config(format!(
                "Ambient light must be a non-negative number, got {}",
                self.ambient_light
            )));
        }
        Ok(())
    }
}

/// Combines a normalized color image with an aligned elevation surface
pub struct FusionRenderer {
    params: FusionParams,
    hillshade: HillshadeCalculator,
}

impl FusionRenderer {
    pub fn new(params: FusionParams) -> FusionResult<Self> {
        params.validate()?;
        let hillshade = HillshadeCalculator::new(params.hillshade)?;
        Ok(Self { params, hillshade })
    }

    /// Hillshade modulation with default sun and ambient light
    pub fn standard() -> Self {
        Self {
            params: FusionParams::default(),
            hillshade: HillshadeCalculator::standard(),
        }
    }

    pub fn params(&self) -> &FusionParams {
        &self.params
    }

    /// Render the composite with the configured strategy
    ///
    /// `color` is a 3-band RGB image on the same grid as `elevation`;
    /// `nodata` marks elevation pixels that must not alter brightness.
    pub fn render(
        &self,
        color: &ImageCube,
        elevation: ArrayView2<f64>,
        nodata: Option<f64>,
    ) -> FusionResult<ImageCube> {
        let (_, rows, cols) = color.dim();
        if (rows, cols) != elevation.dim() {
            return Err(FusionError::Geometry(format!(
                "Color is {}x{} but elevation is {}x{}",
                cols,
                rows,
                elevation.dim().1,
                elevation.dim().0
            )));
        }

        let hsv = HsvImage::from_rgb(color)?;
        let fused = self.modulate_hsv(&hsv, elevation, nodata)?;
        let composite = fused.to_rgb();

        log::info!("Fusion completed ({:?}), {}x{}", self.params.strategy, cols, rows);
        Ok(composite)
    }

    /// Apply the configured strategy in HSV space; hue and saturation are carried over
    #[allow(deprecated)]
    pub fn modulate_hsv(
        &self,
        hsv: &HsvImage,
        elevation: ArrayView2<f64>,
        nodata: Option<f64>,
    ) -> FusionResult<HsvImage> {
        if hsv.dim() != elevation.dim() {
            return Err(FusionError::Geometry(format!(
                "HSV image {:?} does not match elevation {:?}",
                hsv.dim(),
                elevation.dim()
            )));
        }

        let value = match self.params.strategy {
            FusionStrategy::DirectSubstitution => {
                log::warn!("Direct substitution is deprecated and distorts color; prefer hillshade modulation");
                substitute_value(&hsv.value, elevation, nodata)
            }
            FusionStrategy::HillshadeModulation => self.shade_value(&hsv.value, elevation, nodata),
        };

        hsv.with_value(value)
    }

    fn shade_value(&self, value: &Array2<f64>, elevation: ArrayView2<f64>, nodata: Option<f64>) -> Array2<f64> {
        let field = self.hillshade.compute_masked(elevation, nodata);
        let ambient = self.params.ambient_light;

        let mut shaded = Array2::<f64>::zeros(value.dim());
        Zip::from(&mut shaded)
            .and(value)
            .and(&field.values)
            .and(&field.valid)
            .for_each(|out, &v, &shade, &valid| {
                *out = if valid {
                    (v * (shade + ambient)).clamp(0.0, 255.0).trunc()
                } else {
                    v
                };
            });
        shaded
    }
}

/// Legacy brightness replacement by the min/max-scaled elevation
fn substitute_value(value: &Array2<f64>, elevation: ArrayView2<f64>, nodata: Option<f64>) -> Array2<f64> {
    let is_valid = |v: f64| !v.is_nan() && nodata.map_or(true, |nd| v != nd);

    let (min, max) = elevation
        .iter()
        .copied()
        .filter(|&v| is_valid(v))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let range = max - min;

    let mut substituted = value.clone();
    Zip::from(&mut substituted)
        .and(elevation)
        .for_each(|out, &z| {
            if !is_valid(z) {
                return;
            }
            *out = if range > 0.0 {
                ((z - min) / range * 255.0).round().clamp(0.0, 255.0)
            } else {
                0.0
            };
        });
    substituted
}
