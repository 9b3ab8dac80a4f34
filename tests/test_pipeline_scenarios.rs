use approx::assert_relative_eq;
use chrono::{DateTime, TimeZone, Utc};
use geo::{LineString, Polygon};
use ndarray::Array2;
use reswater::core::sampling::METRES_PER_DEGREE;
use reswater::types::{BAND_COVERAGE_FLAG, BAND_GEOMETRY_FLAG, BAND_NDWI, PROP_WATER_AREA};
use reswater::{
    CoordinateSystem, GeoTransform, ImageCollection, MaskedBand, Mission, PipelineConfig, Roi,
    Scene, SourceCollections, WaterAreaPipeline,
};

const PT_TM06: CoordinateSystem = CoordinateSystem::Projected { epsg: 3763 };
const GRID: (usize, usize) = (10, 10);

// CFMASK words
const QA_CLEAR: f32 = 66.0;
const QA_CLOUD_LOW_CONF: f32 = 96.0;
const QA_CLOUD_HIGH_CONF: f32 = 224.0;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Reservoir: 180 m square, 36 sampling cells of 30 m
fn reservoir() -> Roi {
    let ring = LineString::from(vec![
        (60.0, 60.0),
        (240.0, 60.0),
        (240.0, 240.0),
        (60.0, 240.0),
        (60.0, 60.0),
    ]);
    Roi::from_polygon(Polygon::new(ring, vec![]), PT_TM06).unwrap()
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 10, 45, 0).unwrap()
}

/// Raw surface-reflectance scene on a 10x10 grid of 30 m pixels.
///
/// `water` decides whether green exceeds mid-infrared everywhere.
fn raw_scene(
    id: &str,
    mission: Mission,
    time: DateTime<Utc>,
    origin: (f64, f64),
    water: bool,
    qa: Array2<f32>,
) -> Scene {
    let (green, mir) = if water { (900.0, 150.0) } else { (400.0, 1800.0) };
    let raw_names: [(&str, f32); 7] = match mission {
        Mission::Landsat8 => [
            ("B1", 300.0),
            ("B2", 350.0),
            ("B3", green),
            ("B4", 500.0),
            ("B5", 1200.0),
            ("B6", mir),
            ("B7", 1000.0),
        ],
        _ => [
            ("B1", 350.0),
            ("B2", green),
            ("B3", 500.0),
            ("B4", 1200.0),
            ("B5", mir),
            ("B6", 2900.0),
            ("B7", 1000.0),
        ],
    };

    let mut scene = Scene::new(
        id,
        mission,
        time,
        GeoTransform::new(origin.0, origin.1, 30.0, -30.0),
        PT_TM06,
        GRID,
    );
    for (name, value) in raw_names {
        scene
            .add_band(name, MaskedBand::new(Array2::from_elem(GRID, value)))
            .unwrap();
    }
    scene.add_band("pixel_qa", MaskedBand::new(qa)).unwrap();
    scene
}

fn clear_qa() -> Array2<f32> {
    Array2::from_elem(GRID, QA_CLEAR)
}

fn covering(id: &str, mission: Mission, time: DateTime<Utc>) -> Scene {
    raw_scene(id, mission, time, (0.0, 300.0), true, clear_qa())
}

fn pipeline() -> WaterAreaPipeline {
    WaterAreaPipeline::standard(reservoir()).unwrap()
}

#[test]
fn test_reservoir_area_pixel_count() {
    let pipeline = pipeline();
    assert_eq!(pipeline.reservoir_area(), 36.0 * 900.0);
}

#[test]
fn test_scene_outside_roi_excluded() {
    init_logging();
    let far_away = raw_scene("LT05_FAR", Mission::Landsat5, at(1995, 6, 1), (5_000.0, 5_300.0), true, clear_qa());
    let half = raw_scene("LT05_HALF", Mission::Landsat5, at(1995, 7, 3), (150.0, 300.0), true, clear_qa());

    let sources = SourceCollections {
        landsat5: ImageCollection::new(vec![far_away, half]),
        ..Default::default()
    };
    let output = pipeline().run(&sources).unwrap();

    assert_eq!(output.report.legacy_input, 2);
    assert_eq!(output.report.legacy_after_geometry, 0);
    assert!(output.collection.is_empty());
    assert!(output.records.is_empty());
}

#[test]
fn test_clear_full_cover_water_equals_reservoir() {
    init_logging();
    let sources = SourceCollections {
        landsat8: ImageCollection::new(vec![covering("LC08_CLEAR", Mission::Landsat8, at(2016, 8, 14))]),
        ..Default::default()
    };
    let output = pipeline().run(&sources).unwrap();

    assert_eq!(output.records.len(), 1);
    let record = &output.records[0];
    assert_eq!(record.scene_id, "LC08_CLEAR");
    assert_eq!(record.mission, "LC08");
    assert_eq!(record.coverage_ratio, Some(1.0));
    assert_relative_eq!(record.water_area_m2, output.reservoir_area, max_relative = 1e-9);

    let scene = &output.collection.scenes()[0];
    assert_eq!(scene.property(PROP_WATER_AREA), Some(record.water_area_m2));
    assert!(scene.band(BAND_NDWI).is_ok());
    assert!(scene.band(BAND_GEOMETRY_FLAG).is_ok());
    assert!(scene.band(BAND_COVERAGE_FLAG).is_ok());
}

#[test]
fn test_single_cloud_pixel_in_roi_excluded() {
    init_logging();
    let mut qa = clear_qa();
    qa[[4, 4]] = QA_CLOUD_LOW_CONF; // centre (135, 165), inside the reservoir

    let cloudy = raw_scene("LC08_SPECK", Mission::Landsat8, at(2017, 1, 5), (0.0, 300.0), true, qa);
    let sources = SourceCollections {
        landsat8: ImageCollection::new(vec![cloudy, covering("LC08_OK", Mission::Landsat8, at(2017, 1, 21))]),
        ..Default::default()
    };
    let output = pipeline().run(&sources).unwrap();

    assert_eq!(output.report.merged, 2);
    assert_eq!(output.report.after_coverage, 1);
    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].scene_id, "LC08_OK");
}

#[test]
fn test_cloud_outside_roi_does_not_reject() {
    let mut qa = clear_qa();
    qa[[0, 0]] = QA_CLOUD_HIGH_CONF;
    qa[[9, 9]] = QA_CLOUD_HIGH_CONF;

    let scene = raw_scene("LC08_CORNER", Mission::Landsat8, at(2018, 2, 1), (0.0, 300.0), true, qa);
    let sources = SourceCollections {
        landsat8: ImageCollection::new(vec![scene]),
        ..Default::default()
    };
    let output = pipeline().run(&sources).unwrap();
    assert_eq!(output.records.len(), 1);
}

#[test]
fn test_legacy_rule_keeps_low_confidence_cloud() {
    let mut qa = clear_qa();
    qa[[4, 4]] = QA_CLOUD_LOW_CONF;
    let low = raw_scene("LT05_LOW", Mission::Landsat5, at(1990, 3, 1), (0.0, 300.0), true, qa.clone());
    qa[[4, 4]] = QA_CLOUD_HIGH_CONF;
    let high = raw_scene("LT05_HIGH", Mission::Landsat5, at(1990, 3, 17), (0.0, 300.0), true, qa);

    let sources = SourceCollections {
        landsat5: ImageCollection::new(vec![low, high]),
        ..Default::default()
    };
    let output = pipeline().run(&sources).unwrap();

    let ids: Vec<&str> = output.records.iter().map(|r| r.scene_id.as_str()).collect();
    assert_eq!(ids, vec!["LT05_LOW"]);
}

#[test]
fn test_legacy_edge_pixels_reject_scene() {
    let mut scene = covering("LT04_EDGE", Mission::Landsat4, at(1988, 9, 9));
    // A pixel missing from one band only; the legacy mask drops it everywhere
    let mut mask = Array2::from_elem(GRID, true);
    mask[[5, 5]] = false;
    let mir = scene.bands()["B5"].data.clone();
    scene.add_band("B5", MaskedBand::with_mask(mir, mask).unwrap()).unwrap();

    let sources = SourceCollections {
        landsat4: ImageCollection::new(vec![scene]),
        ..Default::default()
    };
    let output = pipeline().run(&sources).unwrap();
    assert_eq!(output.report.merged, 1);
    assert_eq!(output.report.after_coverage, 0);
}

#[test]
fn test_sensor_merge_keeps_identical_timestamps() {
    init_logging();
    let same_time = at(2013, 5, 2);
    let sources = SourceCollections {
        landsat4: ImageCollection::new(vec![covering("LT04_OLD", Mission::Landsat4, at(1989, 1, 1))]),
        landsat5: ImageCollection::new(vec![
            covering("LT05_SAME", Mission::Landsat5, same_time),
            covering("LT05_MID", Mission::Landsat5, at(2001, 11, 30)),
        ]),
        landsat8: ImageCollection::new(vec![
            covering("LC08_LATE", Mission::Landsat8, at(2019, 6, 6)),
            covering("LC08_SAME", Mission::Landsat8, same_time),
        ]),
    };
    let output = pipeline().run(&sources).unwrap();

    let ids: Vec<&str> = output.records.iter().map(|r| r.scene_id.as_str()).collect();
    assert_eq!(ids, vec!["LT04_OLD", "LT05_MID", "LT05_SAME", "LC08_SAME", "LC08_LATE"]);
    assert!(output.records.windows(2).all(|w| w[0].date <= w[1].date));
    assert_eq!(output.report.legacy_input, 3);
    assert_eq!(output.report.oli_input, 2);
    assert_eq!(output.report.scored, 5);
}

#[test]
fn test_date_range_compaction() {
    let sources = SourceCollections {
        landsat5: ImageCollection::new(vec![
            covering("LT05_EARLY", Mission::Landsat5, at(1981, 12, 31)),
            covering("LT05_FIRST", Mission::Landsat5, at(1982, 1, 1)),
        ]),
        landsat8: ImageCollection::new(vec![covering("LC08_AFTER", Mission::Landsat8, at(2020, 1, 2))]),
        ..Default::default()
    };
    let output = pipeline().run(&sources).unwrap();

    assert_eq!(output.report.legacy_after_geometry, 1);
    assert_eq!(output.report.oli_after_geometry, 0);
    assert_eq!(output.records[0].scene_id, "LT05_FIRST");
}

#[test]
fn test_dry_reservoir_scores_zero() {
    let dry = raw_scene("LC08_DRY", Mission::Landsat8, at(2017, 9, 1), (0.0, 300.0), false, clear_qa());
    let sources = SourceCollections {
        landsat8: ImageCollection::new(vec![dry]),
        ..Default::default()
    };
    let output = pipeline().run(&sources).unwrap();
    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].water_area_m2, 0.0);
}

#[test]
fn test_relaxed_coverage_threshold() {
    let mut qa = clear_qa();
    qa[[4, 4]] = QA_CLOUD_HIGH_CONF;
    let scene = raw_scene("LC08_SPECK", Mission::Landsat8, at(2017, 1, 5), (0.0, 300.0), true, qa);
    let sources = SourceCollections {
        landsat8: ImageCollection::new(vec![scene]),
        ..Default::default()
    };

    let config = PipelineConfig {
        coverage_threshold: 0.95,
        ..PipelineConfig::default()
    };
    let output = WaterAreaPipeline::new(config, reservoir()).unwrap().run(&sources).unwrap();

    assert_eq!(output.records.len(), 1);
    let record = &output.records[0];
    assert_relative_eq!(record.coverage_ratio.unwrap(), 35.0 / 36.0);
    // The clouded pixel is masked, so it cannot count as water
    assert_relative_eq!(record.water_area_m2, 35.0 * 900.0);
}

#[test]
fn test_missing_raw_band_is_error() {
    let mut scene = covering("LC08_BROKEN", Mission::Landsat8, at(2016, 1, 1));
    scene.remove_band("B6");
    let sources = SourceCollections {
        landsat8: ImageCollection::new(vec![scene]),
        ..Default::default()
    };
    assert!(pipeline().run(&sources).is_err());
}

fn geographic_oli_scene(id: &str, top_left: (f64, f64), step: f64) -> Scene {
    let dim = (14, 14);
    let mut scene = Scene::new(
        id,
        Mission::Landsat8,
        at(2016, 6, 20),
        GeoTransform::new(top_left.0, top_left.1, step, -step),
        CoordinateSystem::Geographic,
        dim,
    );
    for (name, value) in [("B2", 350.0), ("B3", 900.0), ("B4", 500.0), ("B5", 1200.0), ("B6", 150.0)] {
        scene
            .add_band(name, MaskedBand::new(Array2::from_elem(dim, value)))
            .unwrap();
    }
    scene
        .add_band("pixel_qa", MaskedBand::new(Array2::from_elem(dim, QA_CLEAR)))
        .unwrap();
    scene
}

#[test]
fn test_geographic_half_cover_excluded() {
    init_logging();
    let step = 30.0 / METRES_PER_DEGREE;
    // 10 x 10 cells of 30 m near 7.9 W, 38.2 N
    let (x0, y1) = (-29_300.0 * step, 141_760.0 * step);
    let (x1, y0) = (x0 + 10.0 * step, y1 - 10.0 * step);
    let ring = LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]);
    let roi = Roi::from_polygon(Polygon::new(ring, vec![]), CoordinateSystem::Geographic).unwrap();

    let config = PipelineConfig {
        analysis_crs: CoordinateSystem::Geographic,
        ..PipelineConfig::default()
    };
    let pipeline = WaterAreaPipeline::new(config, roi).unwrap();

    let full = geographic_oli_scene("LC08_FULL", (x0 - 2.0 * step, y1 + 2.0 * step), step);
    // Western edge at the ROI's middle meridian: only the eastern half is covered
    let half = geographic_oli_scene("LC08_HALF", (x0 + 5.0 * step, y1 + 2.0 * step), step);

    let sources = SourceCollections {
        landsat8: ImageCollection::new(vec![half, full]),
        ..Default::default()
    };
    let output = pipeline.run(&sources).unwrap();

    assert_eq!(output.report.oli_input, 2);
    assert_eq!(output.report.oli_after_geometry, 1);
    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].scene_id, "LC08_FULL");
    assert_relative_eq!(output.records[0].water_area_m2, output.reservoir_area, max_relative = 1e-12);
    // Ground area, not degrees: just under 100 cells of 900 m2
    assert!(output.reservoir_area > 100.0 * 900.0 * 0.75);
    assert!(output.reservoir_area < 100.0 * 900.0 * 0.8);
}
