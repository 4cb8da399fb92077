use crate::io::{RasterReader, RasterSource};
use crate::types::{
    DestinationGrid, FusionError, FusionResult, GeoTransform, RasterBand, RasterCube, RasterRole,
};
use gdal::spatial_ref::{CoordTransform, SpatialRef};
use ndarray::{Array2, Array3, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Pixel-count slack when sizing the destination grid
const GRID_TOLERANCE: f64 = 1e-9;

/// Parameters for raster alignment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentParams {
    /// Fill value for color pixels outside the source coverage
    pub color_nodata: f64,
    /// Sentinel used when the elevation source declares none
    pub default_elevation_nodata: f64,
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            color_nodata: 0.0,
            default_elevation_nodata: -32768.0, // SRTM void convention
        }
    }
}

/// Both sources resampled onto one destination grid
#[derive(Debug, Clone)]
pub struct AlignedRasters {
    pub grid: DestinationGrid,
    /// Color samples as (band, row, col)
    pub color: RasterCube,
    /// True where every color band was sampled from the source
    pub color_coverage: Array2<bool>,
    pub elevation: RasterBand,
    /// Elevation sentinel exactly as declared by the source
    pub elevation_nodata: f64,
}

/// Maps destination CRS coordinates into a source CRS
///
/// Points that cannot be transformed are set to NaN.
pub trait PointTransform {
    fn transform(&self, xs: &mut [f64], ys: &mut [f64]) -> FusionResult<()>;
}

/// Source and destination share a CRS
pub struct IdentityTransform;

impl PointTransform for IdentityTransform {
    fn transform(&self, _xs: &mut [f64], _ys: &mut [f64]) -> FusionResult<()> {
        Ok(())
    }
}

/// CRS reconciliation through GDAL/PROJ
pub struct GdalPointTransform {
    inner: CoordTransform,
}

impl GdalPointTransform {
    /// Both spatial refs are switched to traditional GIS axis order (x = lon, y = lat)
    pub fn new(source: SpatialRef, target: SpatialRef) -> FusionResult<Self> {
        source.set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
        target.set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
        let inner = CoordTransform::new(&source, &target)?;
        Ok(Self { inner })
    }
}

impl PointTransform for GdalPointTransform {
    fn transform(&self, xs: &mut [f64], ys: &mut [f64]) -> FusionResult<()> {
        let original_x = xs.to_vec();
        let original_y = ys.to_vec();
        let mut zs = vec![0.0; xs.len()];

        if self.inner.transform_coords(xs, ys, &mut zs).is_err() {
            // A single unprojectable point fails the whole batch; retry pointwise
            for i in 0..xs.len() {
                let mut x = [original_x[i]];
                let mut y = [original_y[i]];
                let mut z = [0.0];
                match self.inner.transform_coords(&mut x, &mut y, &mut z) {
                    Ok(()) => {
                        xs[i] = x[0];
                        ys[i] = y[0];
                    }
                    Err(_) => {
                        xs[i] = f64::NAN;
                        ys[i] = f64::NAN;
                    }
                }
            }
        }

        for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
            if !x.is_finite() || !y.is_finite() {
                *x = f64::NAN;
                *y = f64::NAN;
            }
        }
        Ok(())
    }
}

/// Derive the orthogonal destination grid from the color source geometry
///
/// The pixel size is the native ground resolution of the source and the
/// origin is the top-left corner of its bounding extent, so a rotated or
/// skewed source still yields a north-up grid.
pub fn derive_grid(
    source_transform: &GeoTransform,
    width: usize,
    height: usize,
    crs_wkt: &str,
) -> FusionResult<DestinationGrid> {
    let res_x = source_transform.pixel_width.hypot(source_transform.rotation_y);
    let res_y = source_transform.rotation_x.hypot(source_transform.pixel_height);
    if !(res_x.is_finite() && res_y.is_finite()) || res_x <= 0.0 || res_y <= 0.0 {
        return Err(FusionError::Geometry(format!(
            "Non-positive pixel size ({}, {})",
            res_x, res_y
        )));
    }

    let extent = source_transform.extent(width, height);
    let cols = (extent.width() / res_x - GRID_TOLERANCE).ceil();
    let rows = (extent.height() / res_y - GRID_TOLERANCE).ceil();
    if !(cols.is_finite() && rows.is_finite()) || cols < 1.0 || rows < 1.0 {
        return Err(FusionError::Geometry(format!(
            "Degenerate destination grid {}x{} for extent {:?}",
            cols, rows, extent
        )));
    }

    let transform = GeoTransform {
        top_left_x: extent.min_x,
        pixel_width: res_x,
        rotation_x: 0.0,
        top_left_y: extent.max_y,
        rotation_y: 0.0,
        pixel_height: -res_y,
    };

    Ok(DestinationGrid {
        transform,
        width: cols as usize,
        height: rows as usize,
        crs_wkt: crs_wkt.to_string(),
    })
}

/// Fractional source sample positions (col, row) for every destination pixel centre
///
/// Positions use sample-centre coordinates: integer values land on sample
/// centres. Untransformable pixels are NaN.
pub fn source_positions(
    grid: &DestinationGrid,
    source_transform: &GeoTransform,
    point_transform: &dyn PointTransform,
) -> FusionResult<(Array2<f64>, Array2<f64>)> {
    let inverse = source_transform.invert()?;
    let shape = grid.shape();
    let mut cols = Array2::<f64>::zeros(shape);
    let mut rows = Array2::<f64>::zeros(shape);

    let mut xs = vec![0.0; grid.width];
    let mut ys = vec![0.0; grid.width];

    for i in 0..grid.height {
        for j in 0..grid.width {
            let (x, y) = grid.pixel_center(i, j);
            xs[j] = x;
            ys[j] = y;
        }

        point_transform.transform(&mut xs, &mut ys)?;

        for j in 0..grid.width {
            let (col, row) = inverse.apply(xs[j], ys[j]);
            cols[[i, j]] = col - 0.5;
            rows[[i, j]] = row - 0.5;
        }
    }

    Ok((cols, rows))
}

/// Bilinear sample at a fractional position
///
/// Returns `None` outside the raster (more than half a pixel past the edge
/// sample centres) or when any neighbour with non-zero weight is no-data or
/// NaN, so coverage boundaries are never blended across.
pub fn bilinear_sample(band: ArrayView2<f64>, col: f64, row: f64, nodata: Option<f64>) -> Option<f64> {
    let (height, width) = band.dim();
    if height == 0 || width == 0 || !col.is_finite() || !row.is_finite() {
        return None;
    }

    let max_col = (width - 1) as f64;
    let max_row = (height - 1) as f64;
    if col < -0.5 || row < -0.5 || col > max_col + 0.5 || row > max_row + 0.5 {
        return None;
    }

    let col = snap(col).clamp(0.0, max_col);
    let row = snap(row).clamp(0.0, max_row);

    let x1 = col.floor() as usize;
    let y1 = row.floor() as usize;
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);

    let dx = col - x1 as f64;
    let dy = row - y1 as f64;

    let neighbours = [
        (band[[y1, x1]], (1.0 - dx) * (1.0 - dy)),
        (band[[y1, x2]], dx * (1.0 - dy)),
        (band[[y2, x1]], (1.0 - dx) * dy),
        (band[[y2, x2]], dx * dy),
    ];

    let mut interpolated = 0.0;
    for (value, weight) in neighbours {
        if weight <= 0.0 {
            continue;
        }
        if value.is_nan() || nodata.map_or(false, |nd| value == nd) {
            return None;
        }
        interpolated += value * weight;
    }

    Some(interpolated)
}

/// Round positions within float noise of a sample centre onto it
fn snap(position: f64) -> f64 {
    let nearest = position.round();
    if (position - nearest).abs() < 1e-9 {
        nearest
    } else {
        position
    }
}

/// Resample one band onto precomputed source positions
pub fn resample_band(
    band: ArrayView2<f64>,
    cols: &Array2<f64>,
    rows: &Array2<f64>,
    nodata: Option<f64>,
    fill: f64,
) -> Array2<f64> {
    let mut output = Array2::<f64>::from_elem(cols.dim(), fill);

    #[cfg(feature = "parallel")]
    Zip::from(&mut output)
        .and(cols)
        .and(rows)
        .par_for_each(|out, &col, &row| {
            if let Some(value) = bilinear_sample(band, col, row, nodata) {
                *out = value;
            }
        });

    #[cfg(not(feature = "parallel"))]
    Zip::from(&mut output)
        .and(cols)
        .and(rows)
        .for_each(|out, &col, &row| {
            if let Some(value) = bilinear_sample(band, col, row, nodata) {
                *out = value;
            }
        });

    output
}

/// Aligns the color and elevation sources onto one orthogonal grid
pub struct RasterAligner {
    params: AlignmentParams,
}

impl RasterAligner {
    pub fn new(params: AlignmentParams) -> Self {
        Self { params }
    }

    pub fn standard() -> Self {
        Self::new(AlignmentParams::default())
    }

    /// Read both rasters from disk and align them
    pub fn align_files<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        color_path: P,
        elevation_path: Q,
    ) -> FusionResult<AlignedRasters> {
        let color = RasterReader::read(color_path, RasterRole::Color)?;
        let elevation = RasterReader::read(elevation_path, RasterRole::Elevation)?;
        self.align(&color, &elevation)
    }

    /// Align two in-memory sources; the destination CRS is the color CRS
    pub fn align(&self, color: &RasterSource, elevation: &RasterSource) -> FusionResult<AlignedRasters> {
        log::info!(
            "Aligning {} onto the grid of {}",
            elevation.path.display(),
            color.path.display()
        );

        let color_sr = color.spatial_ref()?;
        let elevation_sr = elevation.spatial_ref()?;

        let grid = derive_grid(&color.geo_transform, color.width(), color.height(), &color.crs_wkt)?;
        log::info!(
            "Destination grid: {}x{} pixels at {:.3}x{:.3}",
            grid.width,
            grid.height,
            grid.resolution().0,
            grid.resolution().1
        );
        if !color.geo_transform.is_north_up() {
            log::debug!("Color source is rotated, resampling onto north-up grid");
        }

        let (color_cube, color_coverage) = self.resample_color(color, &grid)?;

        let elevation_transform: Box<dyn PointTransform> = if color_sr == elevation_sr {
            log::debug!("Elevation shares the destination CRS");
            Box::new(IdentityTransform)
        } else {
            Box::new(
                GdalPointTransform::new(color_sr, elevation_sr).map_err(|e| {
                    FusionError::crs(
                        RasterRole::Elevation,
                        format!("No transformation to the color CRS: {}", e),
                    )
                })?,
            )
        };

        let (elevation_band, elevation_nodata) =
            self.resample_elevation(elevation, &grid, elevation_transform.as_ref())?;

        Ok(AlignedRasters {
            grid,
            color: color_cube,
            color_coverage,
            elevation: elevation_band,
            elevation_nodata,
        })
    }

    /// Resample every color band onto the grid (identity CRS transform)
    ///
    /// Returns the cube together with its coverage mask. Pixels outside the
    /// source footprint, such as the corners around a rotated scene, hold
    /// `color_nodata` and are marked uncovered.
    pub fn resample_color(
        &self,
        color: &RasterSource,
        grid: &DestinationGrid,
    ) -> FusionResult<(RasterCube, Array2<bool>)> {
        let (cols, rows) = source_positions(grid, &color.geo_transform, &IdentityTransform)?;

        let mut cube = Array3::<f64>::zeros((color.band_count(), grid.height, grid.width));
        let mut coverage = Array2::<bool>::from_elem(grid.shape(), true);
        for (index, mut target) in cube.axis_iter_mut(Axis(0)).enumerate() {
            // NaN marks pixels bilinear_sample could not fill
            let resampled = resample_band(color.band(index), &cols, &rows, color.no_data, f64::NAN);
            Zip::from(&mut coverage)
                .and(&resampled)
                .for_each(|covered, &v| *covered &= !v.is_nan());
            target.assign(&resampled);
        }

        let fill = self.params.color_nodata;
        cube.mapv_inplace(|v| if v.is_nan() { fill } else { v });

        let covered = coverage.iter().filter(|&&c| c).count();
        log::info!(
            "Color coverage on destination grid: {:.1}%",
            covered as f64 / coverage.len().max(1) as f64 * 100.0
        );

        Ok((cube, coverage))
    }

    /// Resample the elevation band, returning it with its sentinel
    pub fn resample_elevation(
        &self,
        elevation: &RasterSource,
        grid: &DestinationGrid,
        point_transform: &dyn PointTransform,
    ) -> FusionResult<(RasterBand, f64)> {
        let nodata = match elevation.no_data {
            Some(value) => value,
            None => {
                log::warn!(
                    "{} declares no no-data value, using {}",
                    elevation.path.display(),
                    self.params.default_elevation_nodata
                );
                self.params.default_elevation_nodata
            }
        };

        let (cols, rows) = source_positions(grid, &elevation.geo_transform, point_transform)?;
        let resampled = resample_band(elevation.band(0), &cols, &rows, Some(nodata), nodata);

        let valid = resampled.iter().filter(|&&v| v != nodata && !v.is_nan()).count();
        let coverage = valid as f64 / resampled.len() as f64 * 100.0;
        log::info!("Elevation coverage on destination grid: {:.1}%", coverage);
        if valid == 0 {
            log::warn!("Elevation source does not overlap the color extent");
        }

        Ok((resampled, nodata))
    }
}
