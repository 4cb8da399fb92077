use crate::types::{DestinationGrid, FusionError, FusionResult, GeoTransform, ImageCube};
use gdal::raster::{Buffer, GdalType};
use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;
use ndarray::{Array3, Axis};
use std::path::Path;

/// GeoTIFF export of band-major arrays
pub struct RasterWriter;

impl RasterWriter {
    /// Save an 8-bit image (normalized color or composite) on the destination grid
    pub fn save_image<P: AsRef<Path>>(
        image: &ImageCube,
        grid: &DestinationGrid,
        output_path: P,
    ) -> FusionResult<()> {
        let (_, height, width) = image.dim();
        if (height, width) != grid.shape() {
            return Err(FusionError::Geometry(format!(
                "Image is {}x{} but grid is {}x{}",
                width, height, grid.width, grid.height
            )));
        }
        Self::save_geotiff(image, &grid.transform, &grid.crs_wkt, None, output_path)
    }

    /// Save any band-major cube as a GeoTIFF
    pub fn save_geotiff<T, P>(
        data: &Array3<T>,
        transform: &GeoTransform,
        crs_wkt: &str,
        no_data: Option<f64>,
        output_path: P,
    ) -> FusionResult<()>
    where
        T: GdalType + Copy,
        P: AsRef<Path>,
    {
        log::info!("Saving GeoTIFF: {}", output_path.as_ref().display());

        let (bands, height, width) = data.dim();
        if bands == 0 || height == 0 || width == 0 {
            return Err(FusionError::Geometry("Refusing to write an empty raster".to_string()));
        }

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset = driver.create_with_band_type::<T, _>(
            output_path.as_ref(),
            width as isize,
            height as isize,
            bands as isize,
        )?;

        dataset.set_geo_transform(&transform.to_gdal())?;
        if !crs_wkt.is_empty() {
            dataset.set_spatial_ref(&SpatialRef::from_wkt(crs_wkt)?)?;
        }

        for (index, band) in data.axis_iter(Axis(0)).enumerate() {
            let mut rasterband = dataset.rasterband((index + 1) as isize)?;
            let flat: Vec<T> = band.iter().copied().collect();
            let buffer = Buffer::new((width, height), flat);
            rasterband.write((0, 0), (width, height), &buffer)?;
            if no_data.is_some() {
                rasterband.set_no_data_value(no_data)?;
            }
        }

        log::debug!("Wrote {} band(s) of {}x{}", bands, width, height);
        Ok(())
    }
}
