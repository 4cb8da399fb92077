//! terrafuse: co-registration and relief-shaded fusion of satellite imagery
//!
//! Aligns a high-resolution multi-band color raster and a coarser elevation
//! model onto one orthogonal grid, stretches the color bands to 8 bits and
//! injects sun-angle hillshading into their brightness.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    BoundingBox, DestinationGrid, FusionError, FusionResult, GeoTransform, PipelineStage,
    RasterRole,
};

pub use io::{RasterReader, RasterSource, RasterWriter};

pub use crate::core::{
    AlignedRasters, ChannelContrastNormalizer, FusionConfig, FusionPipeline, FusionRenderer,
    FusionStrategy, HillshadeCalculator, RasterAligner,
};

#[cfg(feature = "python")]
mod python {
    use super::*;
    use crate::core::{ContrastParams, FusionParams, HillshadeParams};
    use numpy::{IntoPyArray, PyArray2, PyArray3, PyReadonlyArray2, PyReadonlyArray3};
    use pyo3::prelude::*;

    fn to_py_err(e: FusionError) -> PyErr {
        match e {
            FusionError::Config(_) => PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string()),
            FusionError::Read { .. } | FusionError::Io(_) => {
                PyErr::new::<pyo3::exceptions::PyIOError, _>(e.to_string())
            }
            _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string()),
        }
    }

    /// Align two rasters; returns (color, elevation, elevation_nodata)
    #[pyfunction]
    fn align_rasters<'py>(
        py: Python<'py>,
        color_path: String,
        elevation_path: String,
    ) -> PyResult<(&'py PyArray3<f64>, &'py PyArray2<f64>, f64)> {
        let aligned = RasterAligner::standard()
            .align_files(&color_path, &elevation_path)
            .map_err(to_py_err)?;
        Ok((
            aligned.color.into_pyarray(py),
            aligned.elevation.into_pyarray(py),
            aligned.elevation_nodata,
        ))
    }

    /// Percentile contrast stretch of a single band
    #[pyfunction]
    #[pyo3(signature = (channel, low_percentile=2.0, high_percentile=98.0))]
    fn normalize_channel<'py>(
        py: Python<'py>,
        channel: PyReadonlyArray2<'py, f64>,
        low_percentile: f64,
        high_percentile: f64,
    ) -> PyResult<&'py PyArray2<u8>> {
        let normalizer = ChannelContrastNormalizer::new(ContrastParams {
            low_percentile,
            high_percentile,
        })
        .map_err(to_py_err)?;
        let stretched = normalizer.normalize_channel(channel.as_array()).map_err(to_py_err)?;
        Ok(stretched.into_pyarray(py))
    }

    /// Normalized illumination in [0, 1]
    #[pyfunction]
    #[pyo3(signature = (elevation, azimuth=315.0, altitude=45.0, nodata=None))]
    fn hillshade<'py>(
        py: Python<'py>,
        elevation: PyReadonlyArray2<'py, f64>,
        azimuth: f64,
        altitude: f64,
        nodata: Option<f64>,
    ) -> PyResult<&'py PyArray2<f64>> {
        let calculator = HillshadeCalculator::new(HillshadeParams {
            azimuth_deg: azimuth,
            altitude_deg: altitude,
            ..HillshadeParams::default()
        })
        .map_err(to_py_err)?;
        let field = calculator.compute_masked(elevation.as_array(), nodata);
        Ok(field.values.into_pyarray(py))
    }

    /// Hillshade-modulated composite of a band-major RGB image
    #[pyfunction]
    #[pyo3(signature = (color, elevation, nodata=None, azimuth=315.0, altitude=45.0, ambient_light=0.5))]
    fn fuse<'py>(
        py: Python<'py>,
        color: PyReadonlyArray3<'py, u8>,
        elevation: PyReadonlyArray2<'py, f64>,
        nodata: Option<f64>,
        azimuth: f64,
        altitude: f64,
        ambient_light: f64,
    ) -> PyResult<&'py PyArray3<u8>> {
        let renderer = FusionRenderer::new(FusionParams {
            strategy: FusionStrategy::HillshadeModulation,
            hillshade: HillshadeParams {
                azimuth_deg: azimuth,
                altitude_deg: altitude,
                ..HillshadeParams::default()
            },
            ambient_light,
        })
        .map_err(to_py_err)?;
        let color = color.as_array().to_owned();
        let composite = renderer
            .render(&color, elevation.as_array(), nodata)
            .map_err(to_py_err)?;
        Ok(composite.into_pyarray(py))
    }

    /// Full pipeline; returns (normalized_color, elevation, nodata, composite)
    #[pyfunction]
    fn run_pipeline<'py>(
        py: Python<'py>,
        color_path: String,
        elevation_path: String,
    ) -> PyResult<(&'py PyArray3<u8>, &'py PyArray2<f64>, f64, &'py PyArray3<u8>)> {
        let pipeline = FusionPipeline::new(FusionConfig::default()).map_err(to_py_err)?;
        let products = pipeline.run(&color_path, &elevation_path).map_err(to_py_err)?;
        Ok((
            products.normalized_color.into_pyarray(py),
            products.elevation.into_pyarray(py),
            products.elevation_nodata,
            products.composite.into_pyarray(py),
        ))
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(align_rasters, m)?)?;
        m.add_function(wrap_pyfunction!(normalize_channel, m)?)?;
        m.add_function(wrap_pyfunction!(hillshade, m)?)?;
        m.add_function(wrap_pyfunction!(fuse, m)?)?;
        m.add_function(wrap_pyfunction!(run_pipeline, m)?)?;
        Ok(())
    }
}
