use crate::core::alignment::{AlignedRasters, AlignmentParams, RasterAligner};
use crate::core::contrast::{ChannelContrastNormalizer, ContrastParams};
use crate::core::fusion::{FusionParams, FusionRenderer};
use crate::io::RasterReader;
use crate::types::{
    DestinationGrid, FusionResult, ImageCube, PipelineStage, RasterBand, RasterRole,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Every tunable of the alignment and fusion pipeline
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FusionConfig {
    pub contrast: ContrastParams,
    pub alignment: AlignmentParams,
    pub fusion: FusionParams,
}

impl FusionConfig {
    pub fn validate(&self) -> FusionResult<()> {
        self.contrast.validate()?;
        self.fusion.validate()?;
        Ok(())
    }
}

/// Outputs of a full pipeline run, all on `grid`
#[derive(Debug, Clone)]
pub struct FusionProducts {
    pub grid: DestinationGrid,
    pub normalized_color: ImageCube,
    pub elevation: RasterBand,
    pub elevation_nodata: f64,
    pub composite: ImageCube,
}

/// Read, align, normalize and fuse two rasters
pub struct FusionPipeline {
    aligner: RasterAligner,
    normalizer: ChannelContrastNormalizer,
    renderer: FusionRenderer,
}

impl FusionPipeline {
    pub fn new(config: FusionConfig) -> FusionResult<Self> {
        config.validate()?;
        Ok(Self {
            aligner: RasterAligner::new(config.alignment),
            normalizer: ChannelContrastNormalizer::new(config.contrast)?,
            renderer: FusionRenderer::new(config.fusion)?,
        })
    }

    /// Run every stage; any failure is reported with its stage and nothing partial is returned
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        color_path: P,
        elevation_path: Q,
    ) -> FusionResult<FusionProducts> {
        let color = RasterReader::read(color_path, RasterRole::Color)
            .map_err(|e| e.at_stage(PipelineStage::Read))?;
        let elevation = RasterReader::read(elevation_path, RasterRole::Elevation)
            .map_err(|e| e.at_stage(PipelineStage::Read))?;

        let aligned = self
            .aligner
            .align(&color, &elevation)
            .map_err(|e| e.at_stage(PipelineStage::Align))?;

        // Source arrays are no longer needed once resampled
        drop(color);
        drop(elevation);

        self.fuse_aligned(aligned)
    }

    /// Normalize and fuse already aligned rasters
    pub fn fuse_aligned(&self, aligned: AlignedRasters) -> FusionResult<FusionProducts> {
        let AlignedRasters {
            grid,
            color,
            color_coverage,
            elevation,
            elevation_nodata,
        } = aligned;

        let normalized_color = self
            .normalizer
            .normalize_color_masked(color.view(), Some(color_coverage.view()))
            .map_err(|e| e.at_stage(PipelineStage::Normalize))?;

        let composite = self
            .renderer
            .render(&normalized_color, elevation.view(), Some(elevation_nodata))
            .map_err(|e| e.at_stage(PipelineStage::Fuse))?;

        Ok(FusionProducts {
            grid,
            normalized_color,
            elevation,
            elevation_nodata,
            composite,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FusionError, GeoTransform};
    use ndarray::{Array2, Array3};

    fn flat_scene() -> AlignedRasters {
        let mut color = Array3::<f64>::zeros((3, 4, 4));
        for (b, value) in [50.0, 100.0, 150.0].iter().enumerate() {
            color.index_axis_mut(ndarray::Axis(0), b).fill(*value);
        }
        AlignedRasters {
            grid: DestinationGrid {
                transform: GeoTransform::from_gdal([0.0, 10.0, 0.0, 40.0, 0.0, -10.0]),
                width: 4,
                height: 4,
                crs_wkt: String::new(),
            },
            color,
            color_coverage: Array2::from_elem((4, 4), true),
            elevation: Array2::from_elem((4, 4), 100.0),
            elevation_nodata: -32768.0,
        }
    }

    #[test]
    fn test_flat_scene_is_uniform() {
        let pipeline = FusionPipeline::new(FusionConfig::default()).unwrap();
        let products = pipeline.fuse_aligned(flat_scene()).unwrap();

        // Constant channels hit the degenerate percentile rule
        assert!(products.normalized_color.iter().all(|&v| v == 0));
        // Black stays black under any brightness factor
        assert!(products.composite.iter().all(|&v| v == 0));
        assert_eq!(products.elevation_nodata, -32768.0);
    }

    #[test]
    fn test_missing_input_reports_read_stage() {
        let pipeline = FusionPipeline::new(FusionConfig::default()).unwrap();
        let err = pipeline
            .run("/nonexistent/color.tif", "/nonexistent/dem.tif")
            .unwrap_err();

        assert_eq!(err.stage(), Some(PipelineStage::Read));
        match err {
            FusionError::Stage { source, .. } => {
                assert!(matches!(*source, FusionError::Read { role: RasterRole::Color, .. }))
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = FusionConfig::default();
        config.contrast.low_percentile = 99.0;
        assert!(matches!(FusionPipeline::new(config), Err(FusionError::Config(_))));
    }

    #[test]
    fn test_all_nan_color_reports_normalize_stage() {
        let mut scene = flat_scene();
        scene.color.fill(f64::NAN);
        let pipeline = FusionPipeline::new(FusionConfig::default()).unwrap();
        let err = pipeline.fuse_aligned(scene).unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Normalize));
    }

    #[test]
    fn test_uncovered_color_reports_normalize_stage() {
        let mut scene = flat_scene();
        scene.color_coverage.fill(false);
        let pipeline = FusionPipeline::new(FusionConfig::default()).unwrap();
        let err = pipeline.fuse_aligned(scene).unwrap_err();
        assert_eq!(err.stage(), Some(PipelineStage::Normalize));
        match err {
            FusionError::Stage { source, .. } => assert!(matches!(*source, FusionError::Numeric(_))),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
