//! reswater: reservoir surface-water area from Landsat time series
//!
//! Filters Landsat 4/5/8 surface-reflectance scenes down to those that fully
//! cover a reservoir and are cloud free over it, then scores each survivor
//! with the modified normalized difference water index (MNDWI) and sums the
//! ground area of the water pixels. The result is a time-ordered series of
//! (capture time, water area) rows.

pub mod types;
pub mod config;
pub mod scene;
pub mod collection;
pub mod core;
pub mod io;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    BandImage, ValidityMask, CoordinateSystem, GeoTransform, Mission, SensorFamily,
    WaterError, WaterResult,
};
pub use config::{BandMap, BandMaps, DateRange, PipelineConfig, QaBits, WaterIndexBands};
pub use scene::{Acceptance, MaskedBand, RejectReason, Scene};
pub use collection::ImageCollection;
pub use crate::core::{
    GeometryFilter, Roi, SamplingGrid, CloudMask, CoverageFilter, WaterScorer,
    WaterAreaPipeline, SourceCollections, PipelineOutput, StageReport,
};
pub use io::{write_csv, write_csv_file, WaterAreaRecord};
