mod common;

use common::*;
use terrafuse::core::color::HsvImage;
use terrafuse::{
    FusionConfig, FusionError, FusionPipeline, PipelineStage, RasterReader, RasterRole,
    RasterWriter,
};

#[test]
fn test_end_to_end_pipeline() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    let color_path = write_color(dir.path());
    let dem_path = write_dem(dir.path(), "dem.tif", &padded(&color_extent_lonlat(), 0.002));

    let pipeline = FusionPipeline::new(FusionConfig::default()).unwrap();
    let products = pipeline.run(&color_path, &dem_path).expect("pipeline should succeed");

    let shape = (3, COLOR_HEIGHT, COLOR_WIDTH);
    assert_eq!(products.normalized_color.dim(), shape);
    assert_eq!(products.composite.dim(), shape);
    assert_eq!(products.elevation.dim(), (COLOR_HEIGHT, COLOR_WIDTH));
    assert_eq!(products.elevation_nodata, DEM_NODATA);

    // Every band is stretched across the full 8-bit range
    for band in products.normalized_color.outer_iter() {
        assert_eq!(band.iter().copied().min(), Some(0));
        assert_eq!(band.iter().copied().max(), Some(255));
    }

    // Shading changes brightness only: hue is stable wherever the pixel
    // is saturated enough for 8-bit rounding not to matter
    let before = HsvImage::from_rgb(&products.normalized_color).unwrap();
    let after = HsvImage::from_rgb(&products.composite).unwrap();
    for ((idx, &s), &v) in before.saturation.indexed_iter().zip(after.value.iter()) {
        if s > 0.5 && v > 64.0 && before.value[idx] > 64.0 {
            let dh = (before.hue[idx] - after.hue[idx]).abs();
            let dh = dh.min(360.0 - dh);
            assert!(dh < 5.0, "hue drift {} at {:?}", dh, idx);
        }
    }
}

#[test]
fn test_composite_export_roundtrip() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    let color_path = write_color(dir.path());
    let dem_path = write_dem(dir.path(), "dem.tif", &padded(&color_extent_lonlat(), 0.002));
    let products = FusionPipeline::new(FusionConfig::default())
        .unwrap()
        .run(&color_path, &dem_path)
        .unwrap();

    let out_path = dir.path().join("composite.tif");
    RasterWriter::save_image(&products.composite, &products.grid, &out_path).unwrap();

    let reread = RasterReader::read(&out_path, RasterRole::Color).unwrap();
    assert_eq!(reread.geo_transform, products.grid.transform);
    assert_eq!(reread.data, products.composite.mapv(f64::from));
}

#[test]
fn test_pipeline_reports_failing_stage_and_input() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let color_path = write_color(dir.path());

    let err = FusionPipeline::new(FusionConfig::default())
        .unwrap()
        .run(&color_path, dir.path().join("missing_dem.tif"))
        .unwrap_err();

    assert_eq!(err.stage(), Some(PipelineStage::Read));
    let message = err.to_string();
    assert!(message.contains("read stage"), "{}", message);
    assert!(message.contains("elevation"), "{}", message);
    assert!(matches!(err, FusionError::Stage { .. }));
}
