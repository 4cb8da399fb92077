use crate::types::{FusionError, FusionResult, GeoTransform, RasterCube, RasterRole};
use gdal::spatial_ref::SpatialRef;
use gdal::Dataset;
use ndarray::{Array3, ArrayView2, Axis};
use std::path::{Path, PathBuf};

/// Number of bands the color source must provide (R, G, B)
pub const COLOR_BANDS: usize = 3;

/// In-memory copy of a georeferenced raster
#[derive(Debug, Clone)]
pub struct RasterSource {
    pub role: RasterRole,
    pub path: PathBuf,
    /// Samples as (band, row, col)
    pub data: RasterCube,
    pub geo_transform: GeoTransform,
    /// Coordinate reference system as WKT
    pub crs_wkt: String,
    /// GDAL pixel type of the first band, for diagnostics
    pub data_type: String,
    pub no_data: Option<f64>,
}

impl RasterSource {
    pub fn band_count(&self) -> usize {
        self.data.dim().0
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    pub fn band(&self, index: usize) -> ArrayView2<'_, f64> {
        self.data.index_axis(Axis(0), index)
    }

    /// Parse the stored WKT into a GDAL spatial reference
    pub fn spatial_ref(&self) -> FusionResult<SpatialRef> {
        SpatialRef::from_wkt(&self.crs_wkt)
            .map_err(|e| FusionError::crs(self.role, format!("Unresolvable CRS: {}", e)))
    }
}

/// GDAL-backed raster reader
///
/// The dataset handle only lives for the duration of [`RasterReader::read`],
/// so it is closed on every return path.
pub struct RasterReader;

impl RasterReader {
    /// Read a raster fully into memory
    ///
    /// Color sources must carry at least three bands (the first three are
    /// used); elevation sources use band 1.
    pub fn read<P: AsRef<Path>>(path: P, role: RasterRole) -> FusionResult<RasterSource> {
        let path = path.as_ref();
        log::info!("Reading {} raster from: {}", role, path.display());

        if !path.exists() {
            return Err(FusionError::read(
                role,
                format!("File not found: {}", path.display()),
            ));
        }

        let dataset = Dataset::open(path)
            .map_err(|e| FusionError::read(role, format!("{}: {}", path.display(), e)))?;

        let (width, height) = dataset.raster_size();
        if width == 0 || height == 0 {
            return Err(FusionError::read(role, "Raster has zero size"));
        }

        let geo_transform = dataset
            .geo_transform()
            .map(GeoTransform::from_gdal)
            .map_err(|e| FusionError::read(role, format!("Missing geotransform: {}", e)))?;

        let crs_wkt = dataset.projection();
        if crs_wkt.trim().is_empty() {
            return Err(FusionError::crs(
                role,
                format!("{} declares no coordinate reference system", path.display()),
            ));
        }
        SpatialRef::from_wkt(&crs_wkt)
            .map_err(|e| FusionError::crs(role, format!("Unresolvable CRS: {}", e)))?;

        let available = dataset.raster_count().max(0) as usize;
        let wanted = match role {
            RasterRole::Color => COLOR_BANDS,
            RasterRole::Elevation => 1,
        };
        if available < wanted {
            return Err(FusionError::read(
                role,
                format!("Expected at least {} band(s), found {}", wanted, available),
            ));
        }
        if available > wanted {
            log::warn!(
                "{} raster has {} bands, using the first {}",
                role,
                available,
                wanted
            );
        }

        log::debug!("{} raster size: {}x{}, {} band(s)", role, width, height, wanted);
        log::debug!("{} geotransform: {:?}", role, geo_transform);

        let mut data = Array3::<f64>::zeros((wanted, height, width));
        let mut data_type = String::new();
        let mut no_data = None;

        for band_index in 0..wanted {
            let rasterband = dataset
                .rasterband((band_index + 1) as isize)
                .map_err(|e| FusionError::read(role, format!("Band {}: {}", band_index + 1, e)))?;

            if band_index == 0 {
                data_type = format!("{:?}", rasterband.band_type());
                no_data = rasterband.no_data_value();
            }

            let buffer = rasterband
                .read_as::<f64>((0, 0), (width, height), (width, height), None)
                .map_err(|e| FusionError::read(role, format!("Band {}: {}", band_index + 1, e)))?;

            if buffer.data.len() != width * height {
                return Err(FusionError::read(
                    role,
                    format!(
                        "Band {} returned {} samples, expected {}",
                        band_index + 1,
                        buffer.data.len(),
                        width * height
                    ),
                ));
            }

            let mut target = data.index_axis_mut(Axis(0), band_index);
            for (dst, src) in target.iter_mut().zip(buffer.data.iter()) {
                *dst = *src;
            }
        }

        log::debug!("{} pixel type: {}, no-data: {:?}", role, data_type, no_data);

        Ok(RasterSource {
            role,
            path: path.to_path_buf(),
            data,
            geo_transform,
            crs_wkt,
            data_type,
            no_data,
        })
    }
}
