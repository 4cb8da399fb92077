//! Raster I/O: scoped GDAL readers and GeoTIFF export

pub mod raster;
pub mod writer;

pub use raster::{RasterReader, RasterSource, COLOR_BANDS};
pub use writer::RasterWriter;
