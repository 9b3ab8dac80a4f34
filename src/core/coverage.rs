use crate::core::sampling::SamplingGrid;
use crate::scene::{MaskedBand, RejectReason, Scene};
use crate::types::*;

/// Valid-area completeness check over the reservoir
pub struct CoverageFilter<'a> {
    grid: &'a SamplingGrid,
    /// Minimum valid-area / reservoir-area ratio
    threshold: f64,
    /// Band whose valid pixels are counted
    band: String,
}

impl<'a> CoverageFilter<'a> {
    pub fn new(grid: &'a SamplingGrid, threshold: f64, band: impl Into<String>) -> Self {
        Self {
            grid,
            threshold,
            band: band.into(),
        }
    }

    /// Cloud-free fraction of the reservoir, in [0, 1]
    pub fn coverage_ratio(&self, scene: &Scene) -> WaterResult<f64> {
        let valid_area = self.grid.valid_area(scene, &self.band)?;
        Ok(valid_area / self.grid.reservoir_area())
    }

    /// Derive a scene carrying the coverage decision
    pub fn apply(&self, scene: &Scene) -> WaterResult<Scene> {
        let ratio = self.coverage_ratio(scene)?;
        let accept = ratio >= self.threshold;

        log::debug!(
            "{}: coverage {:.4} (threshold {}) -> {}",
            scene.id,
            ratio,
            self.threshold,
            if accept { "keep" } else { "reject" }
        );

        let template = scene.band(&self.band)?;
        let flag = MaskedBand::constant_like(&template.mask, if accept { 1.0 } else { 0.0 });

        let mut out = scene.clone();
        out.add_band(BAND_COVERAGE_FLAG, flag)?;
        out.set_property(PROP_COVERAGE_RATIO, ratio);
        if !accept {
            out.reject(RejectReason::InsufficientCoverage);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry_filter::Roi;
    use crate::scene::Acceptance;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use geo::{LineString, Polygon};
    use ndarray::Array2;

    const PT_TM06: CoordinateSystem = CoordinateSystem::Projected { epsg: 3763 };

    fn grid() -> SamplingGrid {
        // 4x4 cells inside a 6x6 scene
        let ring = LineString::from(vec![(30.0, 30.0), (150.0, 30.0), (150.0, 150.0), (30.0, 150.0), (30.0, 30.0)]);
        let roi = Roi::from_polygon(Polygon::new(ring, vec![]), PT_TM06).unwrap();
        SamplingGrid::from_roi(&roi, 30.0).unwrap()
    }

    fn scene(mask: Array2<bool>) -> Scene {
        Scene::new(
            "COVER",
            Mission::Landsat5,
            Utc.with_ymd_and_hms(1990, 4, 2, 10, 0, 0).unwrap(),
            GeoTransform::new(0.0, 180.0, 30.0, -30.0),
            PT_TM06,
            (6, 6),
        )
        .with_band(BAND_RED, MaskedBand::with_mask(Array2::from_elem((6, 6), 400.0), mask).unwrap())
        .unwrap()
    }

    #[test]
    fn test_cloud_free_reservoir_accepted() {
        let g = grid();
        let out = CoverageFilter::new(&g, 1.0, BAND_RED)
            .apply(&scene(Array2::from_elem((6, 6), true)))
            .unwrap();
        assert!(out.is_accepted());
        assert_eq!(out.property(PROP_COVERAGE_RATIO), Some(1.0));
        assert_eq!(out.band(BAND_COVERAGE_FLAG).unwrap().get(2, 2), Some(1.0));
    }

    #[test]
    fn test_single_cloud_pixel_rejects() {
        let g = grid();
        let mut mask = Array2::from_elem((6, 6), true);
        mask[[2, 3]] = false;
        let out = CoverageFilter::new(&g, 1.0, BAND_RED).apply(&scene(mask)).unwrap();
        assert_eq!(out.acceptance(), Acceptance::Rejected(RejectReason::InsufficientCoverage));
        assert_relative_eq!(out.property(PROP_COVERAGE_RATIO).unwrap(), 15.0 / 16.0);
        assert_eq!(out.band(BAND_COVERAGE_FLAG).unwrap().get(0, 0), Some(0.0));
    }

    #[test]
    fn test_cloud_outside_reservoir_ignored() {
        let g = grid();
        let mut mask = Array2::from_elem((6, 6), true);
        mask[[0, 0]] = false;
        mask[[5, 5]] = false;
        let out = CoverageFilter::new(&g, 1.0, BAND_RED).apply(&scene(mask)).unwrap();
        assert!(out.is_accepted());
    }

    #[test]
    fn test_relaxed_threshold() {
        let g = grid();
        let mut mask = Array2::from_elem((6, 6), true);
        mask[[2, 3]] = false;
        let out = CoverageFilter::new(&g, 0.9, BAND_RED).apply(&scene(mask)).unwrap();
        assert!(out.is_accepted());
    }

    #[test]
    fn test_fully_clouded() {
        let g = grid();
        let filter = CoverageFilter::new(&g, 1.0, BAND_RED);
        assert_eq!(filter.coverage_ratio(&scene(Array2::from_elem((6, 6), false))).unwrap(), 0.0);
    }
}
