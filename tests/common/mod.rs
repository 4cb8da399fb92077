#![allow(dead_code)]

use gdal::spatial_ref::{CoordTransform, SpatialRef};
use ndarray::Array3;
use std::path::{Path, PathBuf};
use terrafuse::{BoundingBox, GeoTransform, RasterWriter};

pub const UTM_23S: u32 = 32723;
pub const WGS84: u32 = 4326;
pub const DEM_NODATA: f64 = -32768.0;

/// Color scene: 60x40 pixels of 10 m in UTM 23S
pub const COLOR_WIDTH: usize = 60;
pub const COLOR_HEIGHT: usize = 40;
pub const COLOR_ORIGIN: (f64, f64) = (290_000.0, 7_760_000.0);
pub const COLOR_RES: f64 = 10.0;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn wkt(epsg: u32) -> String {
    SpatialRef::from_epsg(epsg).unwrap().to_wkt().unwrap()
}

pub fn color_transform() -> GeoTransform {
    GeoTransform::from_gdal([COLOR_ORIGIN.0, COLOR_RES, 0.0, COLOR_ORIGIN.1, 0.0, -COLOR_RES])
}

/// Band b, row r, col c: smooth gradient with a couple of hot pixels
pub fn color_samples() -> Array3<u16> {
    let mut data = Array3::<u16>::zeros((3, COLOR_HEIGHT, COLOR_WIDTH));
    for ((b, r, c), v) in data.indexed_iter_mut() {
        *v = (800 + 500 * b + 12 * r + 7 * c) as u16;
    }
    data[[0, 0, 0]] = 65_000;
    data[[2, COLOR_HEIGHT - 1, COLOR_WIDTH - 1]] = 0;
    data
}

pub fn write_color(dir: &Path) -> PathBuf {
    let path = dir.join("color.tif");
    RasterWriter::save_geotiff(&color_samples(), &color_transform(), &wkt(UTM_23S), None, &path).unwrap();
    path
}

/// Geographic extent of the color scene
pub fn color_extent_lonlat() -> BoundingBox {
    let utm = SpatialRef::from_epsg(UTM_23S).unwrap();
    let wgs84 = SpatialRef::from_epsg(WGS84).unwrap();
    wgs84.set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
    let transform = CoordTransform::new(&utm, &wgs84).unwrap();

    let extent = color_transform().extent(COLOR_WIDTH, COLOR_HEIGHT);
    let mut xs = vec![extent.min_x, extent.max_x, extent.min_x, extent.max_x];
    let mut ys = vec![extent.max_y, extent.max_y, extent.min_y, extent.min_y];
    let mut zs = vec![0.0; 4];
    transform.transform_coords(&mut xs, &mut ys, &mut zs).unwrap();

    BoundingBox {
        min_x: xs.iter().cloned().fold(f64::INFINITY, f64::min),
        max_x: xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        min_y: ys.iter().cloned().fold(f64::INFINITY, f64::min),
        max_y: ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// Elevation in degrees lon/lat covering `bbox`, ~30 m posts
///
/// Elevation is a tilted plane between 600 and roughly 700 m.
pub fn write_dem(dir: &Path, name: &str, bbox: &BoundingBox) -> PathBuf {
    let res = 0.0003;
    let width = (bbox.width() / res).ceil() as usize;
    let height = (bbox.height() / res).ceil() as usize;

    let mut data = ndarray::Array3::<f32>::zeros((1, height, width));
    for ((_, r, c), v) in data.indexed_iter_mut() {
        *v = 600.0 + 2.0 * r as f32 + 1.5 * c as f32;
    }

    let gt = GeoTransform::from_gdal([bbox.min_x, res, 0.0, bbox.max_y, 0.0, -res]);
    let path = dir.join(name);
    RasterWriter::save_geotiff(&data, &gt, &wkt(WGS84), Some(DEM_NODATA), &path).unwrap();
    path
}

pub fn padded(bbox: &BoundingBox, pad: f64) -> BoundingBox {
    BoundingBox {
        min_x: bbox.min_x - pad,
        max_x: bbox.max_x + pad,
        min_y: bbox.min_y - pad,
        max_y: bbox.max_y + pad,
    }
}
