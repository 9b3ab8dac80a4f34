use crate::core::geometry_filter::Roi;
use crate::scene::{MaskedBand, Scene};
use crate::types::*;
use ndarray::Array2;

/// Mean Earth radius (IUGG) used for geographic cell areas
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Metres per degree of arc at the equator on the sphere above
pub const METRES_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Ground area of the cell spanning `[lat0, lat1]` x `[lon0, lon0 + dlon]` on the sphere
pub fn spherical_cell_area(lat0_deg: f64, lat1_deg: f64, dlon_deg: f64) -> f64 {
    let (s0, s1) = (lat0_deg.to_radians().sin(), lat1_deg.to_radians().sin());
    EARTH_RADIUS_M * EARTH_RADIUS_M * dlon_deg.abs().to_radians() * (s1 - s0).abs()
}

/// Ground area of pixels in `row` of a grid
pub fn pixel_area(crs: CoordinateSystem, gt: &GeoTransform, row: usize) -> f64 {
    match crs {
        CoordinateSystem::Projected { .. } => (gt.pixel_width * gt.pixel_height).abs(),
        CoordinateSystem::Geographic => {
            let lat0 = gt.top_left_y + row as f64 * gt.pixel_height;
            let lat1 = lat0 + gt.pixel_height;
            spherical_cell_area(lat0, lat1, gt.pixel_width)
        }
    }
}

/// Per-pixel ground area over a whole grid
pub fn pixel_area_image(crs: CoordinateSystem, gt: &GeoTransform, dim: (usize, usize)) -> BandImage {
    Array2::from_shape_fn(dim, |(row, _)| pixel_area(crs, gt, row) as BandReal)
}

/// Cell centre inside the ROI together with the ground area it represents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub area: f64,
}

/// The ROI rasterised at the analysis scale.
///
/// Cells are snapped to integer multiples of the scale, so the same ROI always
/// yields the same samples regardless of which scene is being reduced. Every
/// ROI reduction (reservoir area, valid-pixel coverage, water area) walks these
/// samples in the same order, reading the scene pixel that contains each one.
#[derive(Debug, Clone)]
pub struct SamplingGrid {
    scale: f64,
    crs: CoordinateSystem,
    samples: Vec<SamplePoint>,
    total_area: f64,
}

impl SamplingGrid {
    /// Rasterise `roi` at `scale` ground units
    pub fn from_roi(roi: &Roi, scale: f64) -> WaterResult<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(WaterError::Processing(format!(
                "Sampling scale must be positive, got {}",
                scale
            )));
        }

        let crs = roi.crs();
        let step = match crs {
            CoordinateSystem::Projected { .. } => scale,
            CoordinateSystem::Geographic => scale / METRES_PER_DEGREE,
        };

        let (min_x, min_y, max_x, max_y) = roi.bounds();
        let x0 = (min_x / step).floor() * step;
        let y0 = (max_y / step).ceil() * step;
        let cols = ((max_x - x0) / step).ceil() as usize;
        let rows = ((y0 - min_y) / step).ceil() as usize;

        log::debug!(
            "Rasterising ROI on {}x{} cells of {} ({})",
            rows, cols, step, crs
        );

        let mut samples = Vec::new();
        for row in 0..rows {
            let top = y0 - row as f64 * step;
            let y = top - 0.5 * step;
            let area = match crs {
                CoordinateSystem::Projected { .. } => scale * scale,
                CoordinateSystem::Geographic => spherical_cell_area(top - step, top, step),
            };
            for col in 0..cols {
                let x = x0 + (col as f64 + 0.5) * step;
                if roi.contains_point(x, y) {
                    samples.push(SamplePoint { x, y, area });
                }
            }
        }

        if samples.is_empty() {
            return Err(WaterError::InvalidGeometry(format!(
                "ROI contains no {} unit sampling cell",
                scale
            )));
        }

        let total_area = samples.iter().map(|s| s.area).sum();
        log::info!(
            "Reservoir rasterised to {} samples, area {:.1} m2",
            samples.len(),
            total_area
        );

        Ok(Self {
            scale,
            crs,
            samples,
            total_area,
        })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn crs(&self) -> CoordinateSystem {
        self.crs
    }

    pub fn samples(&self) -> &[SamplePoint] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Reservoir area: sample count times cell area
    pub fn reservoir_area(&self) -> f64 {
        self.total_area
    }

    /// Value of `band` at a sample, `None` when masked or off the grid
    fn sample(band: &MaskedBand, gt: &GeoTransform, point: &SamplePoint) -> Option<BandReal> {
        gt.geo_to_pixel(point.x, point.y, band.dim())
            .and_then(|(row, col)| band.get(row, col))
    }

    /// Number of samples where `band` is valid
    pub fn valid_count(&self, scene: &Scene, band_name: &str) -> WaterResult<usize> {
        let band = scene.band(band_name)?;
        Ok(self
            .samples
            .iter()
            .filter(|p| Self::sample(band, &scene.geo_transform, p).is_some())
            .count())
    }

    /// Summed sample area where `band` (on grid `gt`) is valid and `predicate` holds
    pub fn band_area_where<P>(&self, band: &MaskedBand, gt: &GeoTransform, predicate: P) -> f64
    where
        P: Fn(BandReal) -> bool,
    {
        self.samples
            .iter()
            .filter_map(|p| Self::sample(band, gt, p).map(|v| (v, p.area)))
            .filter(|(v, _)| predicate(*v))
            .map(|(_, area)| area)
            .sum()
    }

    /// Summed sample area where the named scene band is valid and `predicate` holds
    pub fn area_where<P>(&self, scene: &Scene, band_name: &str, predicate: P) -> WaterResult<f64>
    where
        P: Fn(BandReal) -> bool,
    {
        let band = scene.band(band_name)?;
        Ok(self.band_area_where(band, &scene.geo_transform, predicate))
    }

    /// Summed sample area where `band` is valid
    pub fn valid_area(&self, scene: &Scene, band_name: &str) -> WaterResult<f64> {
        self.area_where(scene, band_name, |_| true)
    }
}
