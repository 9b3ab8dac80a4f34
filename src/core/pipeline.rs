//! End-to-end reservoir water-area pipeline.
//!
//! Stages per scene: band harmonisation, full-overlap geometry filter, sensor
//! specific cloud mask, reservoir coverage filter and water scoring. Rejected
//! scenes are compacted out by a date filter after the geometry and coverage
//! stages; the scored collection is returned in capture-time order.

use crate::collection::ImageCollection;
use crate::config::PipelineConfig;
use crate::core::cloud_mask::cloud_mask_for;
use crate::core::coverage::CoverageFilter;
use crate::core::geometry_filter::{GeometryFilter, Roi};
use crate::core::harmonize::harmonize;
use crate::core::sampling::SamplingGrid;
use crate::core::water_index::WaterScorer;
use crate::io::export::WaterAreaRecord;
use crate::types::*;

/// Raw source collections, one per mission
#[derive(Debug, Clone, Default)]
pub struct SourceCollections {
    pub landsat4: ImageCollection,
    pub landsat5: ImageCollection,
    pub landsat8: ImageCollection,
}

/// Collection sizes after each stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageReport {
    pub legacy_input: usize,
    pub oli_input: usize,
    pub legacy_after_geometry: usize,
    pub oli_after_geometry: usize,
    pub merged: usize,
    pub after_coverage: usize,
    pub scored: usize,
}

/// Pipeline result
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Scored scenes in capture-time order
    pub collection: ImageCollection,
    /// One (timestamp, water area) row per scored scene
    pub records: Vec<WaterAreaRecord>,
    pub report: StageReport,
    pub reservoir_area: f64,
}

/// Reservoir water-area pipeline for one ROI
pub struct WaterAreaPipeline {
    config: PipelineConfig,
    roi: Roi,
    grid: SamplingGrid,
}

impl WaterAreaPipeline {
    /// Validate the configuration and rasterise the reservoir once
    pub fn new(config: PipelineConfig, roi: Roi) -> WaterResult<Self> {
        config.validate()?;
        if roi.crs() != config.analysis_crs {
            return Err(WaterError::CrsMismatch {
                expected: config.analysis_crs,
                found: roi.crs(),
            });
        }

        let grid = SamplingGrid::from_roi(&roi, config.scale)?;
        log::info!(
            "Reservoir area calculated using pixel count method: {:.0} m2 ({} pixels at {} m)",
            grid.reservoir_area(),
            grid.len(),
            config.scale
        );

        Ok(Self { config, roi, grid })
    }

    /// Pipeline with default configuration
    pub fn standard(roi: Roi) -> WaterResult<Self> {
        Self::new(PipelineConfig::default(), roi)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn roi(&self) -> &Roi {
        &self.roi
    }

    pub fn reservoir_area(&self) -> f64 {
        self.grid.reservoir_area()
    }

    /// Rename a family's raw bands to the canonical scheme
    pub fn harmonize(&self, collection: &ImageCollection, family: SensorFamily) -> WaterResult<ImageCollection> {
        let band_map = self.config.bands.for_family(family);
        collection.try_map(|scene| harmonize(scene, band_map))
    }

    /// Bounds pre-filter, full-overlap test, then compaction to the date range
    pub fn filter_geometry(&self, collection: ImageCollection) -> WaterResult<ImageCollection> {
        let filter = GeometryFilter::new(&self.roi, self.config.error_margin, self.config.coverage_band.as_str());
        let touching = collection.filter_bounds(&self.roi);
        Ok(touching
            .try_map(|scene| filter.apply(scene))?
            .filter_date(&self.config.date_range))
    }

    /// Apply the cloud mask matching each scene's sensor family
    pub fn mask_clouds(&self, collection: &ImageCollection) -> WaterResult<ImageCollection> {
        let bits = self.config.qa_bits;
        collection.try_map(|scene| cloud_mask_for(scene.mission.family(), bits).apply(scene))
    }

    /// Coverage test, then compaction to the date range
    pub fn filter_coverage(&self, collection: &ImageCollection) -> WaterResult<ImageCollection> {
        let filter = CoverageFilter::new(&self.grid, self.config.coverage_threshold, self.config.coverage_band.as_str());
        Ok(collection
            .try_map(|scene| filter.apply(scene))?
            .filter_date(&self.config.date_range))
    }

    /// Water index, water mask and water area for every scene
    pub fn score(&self, collection: &ImageCollection) -> WaterResult<ImageCollection> {
        let scorer = WaterScorer::new(
            &self.roi,
            &self.grid,
            &self.config.water_index,
            self.config.water_threshold,
        );
        collection.try_map(|scene| scorer.apply(scene))
    }

    /// Run every stage over the raw source collections
    pub fn run(&self, sources: &SourceCollections) -> WaterResult<PipelineOutput> {
        let mut report = StageReport::default();

        let legacy = self
            .harmonize(&sources.landsat4, SensorFamily::Legacy)?
            .merge(self.harmonize(&sources.landsat5, SensorFamily::Legacy)?);
        let oli = self.harmonize(&sources.landsat8, SensorFamily::Oli)?;
        report.legacy_input = legacy.len();
        report.oli_input = oli.len();

        let legacy = self.filter_geometry(legacy)?;
        report.legacy_after_geometry = legacy.len();
        log::info!("L45 collection after overlap filter: {} images", legacy.len());

        let oli = self.filter_geometry(oli)?;
        report.oli_after_geometry = oli.len();
        log::info!("L8 collection after overlap filter: {} images", oli.len());

        // Masks are sensor specific, so they run before the families merge
        let legacy = self.mask_clouds(&legacy)?;
        let oli = self.mask_clouds(&oli)?;
        let merged = legacy.merge(oli);
        report.merged = merged.len();
        log::info!("Merged collection: {} images", merged.len());

        let clear = self.filter_coverage(&merged)?;
        report.after_coverage = clear.len();
        log::info!("Collection after coverage filter: {} images", clear.len());

        let scored = self.score(&clear)?.sort_by_time();
        report.scored = scored.len();
        log::info!("Scored collection: {} images", scored.len());

        let records = scored.iter().filter_map(WaterAreaRecord::from_scene).collect();

        Ok(PipelineOutput {
            collection: scored,
            records,
            report,
            reservoir_area: self.grid.reservoir_area(),
        })
    }
}
