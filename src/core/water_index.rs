use crate::config::WaterIndexBands;
use crate::core::geometry_filter::Roi;
use crate::core::sampling::{pixel_area_image, SamplingGrid};
use crate::scene::{MaskedBand, Scene};
use crate::types::*;
use ndarray::Zip;
use num_traits::Float;

/// `(a - b) / (a + b)`, undefined when the denominator vanishes
#[inline]
pub fn normalized_difference_value<T: Float>(a: T, b: T) -> Option<T> {
    let sum = a + b;
    if !sum.is_finite() || sum == T::zero() {
        return None;
    }
    let value = (a - b) / sum;
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Normalized difference of two masked bands.
///
/// Result pixels are masked where either input is masked or where `a + b == 0`,
/// so no NaN leaks into later stages.
pub fn normalized_difference(a: &MaskedBand, b: &MaskedBand) -> WaterResult<MaskedBand> {
    if a.dim() != b.dim() {
        return Err(WaterError::ShapeMismatch {
            expected: a.dim(),
            found: b.dim(),
        });
    }

    let values = Zip::from(&a.data)
        .and(&a.mask)
        .and(&b.data)
        .and(&b.mask)
        .map_collect(|&va, &ma, &vb, &mb| {
            if ma && mb {
                normalized_difference_value(va, vb)
            } else {
                None
            }
        });

    let mask = values.mapv(|v| v.is_some());
    let data = values.mapv(|v| v.unwrap_or(0.0));
    MaskedBand::with_mask(data, mask)
}

/// 1.0 where the index exceeds `cutoff`, 0.0 elsewhere; masked where the index is
pub fn classify_water(index: &MaskedBand, cutoff: BandReal) -> MaskedBand {
    MaskedBand {
        data: index.data.mapv(|v| if v > cutoff { 1.0 } else { 0.0 }),
        mask: index.mask.clone(),
    }
}

/// Computes the water index, water mask and water surface area of a scene
pub struct WaterScorer<'a> {
    roi: &'a Roi,
    grid: &'a SamplingGrid,
    bands: &'a WaterIndexBands,
    threshold: BandReal,
}

impl<'a> WaterScorer<'a> {
    pub fn new(
        roi: &'a Roi,
        grid: &'a SamplingGrid,
        bands: &'a WaterIndexBands,
        threshold: BandReal,
    ) -> Self {
        Self {
            roi,
            grid,
            bands,
            threshold,
        }
    }

    /// Derive a scene masked to water inside the ROI, with `NDWI` and
    /// `waterArea` bands and the summed `waterArea` property
    pub fn apply(&self, scene: &Scene) -> WaterResult<Scene> {
        let green = scene.band(&self.bands.green)?;
        let mir = scene.band(&self.bands.mir)?;

        let ndwi = normalized_difference(green, mir)?;
        let water = classify_water(&ndwi, self.threshold);
        let is_water = Zip::from(&water.data)
            .and(&water.mask)
            .map_collect(|&v, &m| m && v > 0.5);

        let mut out = scene.clone();
        out.update_mask(&is_water)?;
        out.add_band(BAND_NDWI, ndwi)?;

        let area = pixel_area_image(scene.crs, &scene.geo_transform, water.dim());
        let water_area = MaskedBand {
            data: &water.data * &area,
            mask: water.mask.clone(),
        };
        out.add_band(BAND_WATER_AREA, water_area)?;

        let clip = self.roi.pixel_mask(&scene.geo_transform, water.dim());
        out.update_mask(&clip)?;

        // Samples already lie inside the ROI, so the unclipped water band is enough
        let total = self
            .grid
            .band_area_where(&water, &scene.geo_transform, |v| v > 0.5);
        out.set_property(PROP_WATER_AREA, total);

        log::debug!("{}: water area {:.1} m2", scene.id, total);
        Ok(out)
    }
}
