//! Scene model: a multi-band raster with its grid, footprint and acceptance state.

use crate::types::*;
use chrono::{DateTime, Utc};
use geo::{LineString, Polygon};
use ndarray::{Array2, Zip};
use std::collections::BTreeMap;

/// Band data together with its per-pixel validity mask
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedBand {
    pub data: BandImage,
    pub mask: ValidityMask,
}

impl MaskedBand {
    /// Wrap data with every pixel valid except non-finite values
    pub fn new(data: BandImage) -> Self {
        let mask = data.mapv(|v| v.is_finite());
        Self { data, mask }
    }

    pub fn with_mask(data: BandImage, mask: ValidityMask) -> WaterResult<Self> {
        if data.dim() != mask.dim() {
            return Err(WaterError::ShapeMismatch {
                expected: data.dim(),
                found: mask.dim(),
            });
        }
        Ok(Self { data, mask })
    }

    /// Constant band of `value` sharing the given mask
    pub fn constant_like(mask: &ValidityMask, value: BandReal) -> Self {
        Self {
            data: Array2::from_elem(mask.dim(), value),
            mask: mask.clone(),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Value at (row, col) if the pixel is valid
    pub fn get(&self, row: usize, col: usize) -> Option<BandReal> {
        match self.mask.get((row, col)) {
            Some(true) => self.data.get((row, col)).copied(),
            _ => None,
        }
    }

    /// AND the existing mask with `mask`; masks only ever shrink
    pub fn update_mask(&mut self, mask: &ValidityMask) -> WaterResult<()> {
        if self.mask.dim() != mask.dim() {
            return Err(WaterError::ShapeMismatch {
                expected: self.mask.dim(),
                found: mask.dim(),
            });
        }
        Zip::from(&mut self.mask)
            .and(mask)
            .for_each(|m, &keep| *m = *m && keep);
        Ok(())
    }

    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }
}

/// Why a scene left the working collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Footprint does not fully cover the ROI
    PartialOverlap,
    /// Cloud-free area inside the ROI is below the completeness threshold
    InsufficientCoverage,
}

/// Acceptance state; moves one way only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Accepted,
    Rejected(RejectReason),
}

/// One acquisition of a source collection
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub mission: Mission,
    pub time_start: DateTime<Utc>,
    pub geo_transform: GeoTransform,
    pub crs: CoordinateSystem,
    pub footprint: Polygon<f64>,
    bands: BTreeMap<String, MaskedBand>,
    pub properties: BTreeMap<String, f64>,
    acceptance: Acceptance,
}

impl Scene {
    /// Create a scene whose footprint is its full grid extent
    pub fn new(
        id: impl Into<String>,
        mission: Mission,
        time_start: DateTime<Utc>,
        geo_transform: GeoTransform,
        crs: CoordinateSystem,
        dim: (usize, usize),
    ) -> Self {
        let (min_x, min_y, max_x, max_y) = geo_transform.extent(dim);
        let footprint = Polygon::new(
            LineString::from(vec![
                (min_x, min_y),
                (max_x, min_y),
                (max_x, max_y),
                (min_x, max_y),
                (min_x, min_y),
            ]),
            vec![],
        );

        Self {
            id: id.into(),
            mission,
            time_start,
            geo_transform,
            crs,
            footprint,
            bands: BTreeMap::new(),
            properties: BTreeMap::new(),
            acceptance: Acceptance::Accepted,
        }
    }

    /// Replace the footprint (e.g. the scene's valid-data outline)
    pub fn with_footprint(mut self, footprint: Polygon<f64>) -> Self {
        self.footprint = footprint;
        self
    }

    /// Add or replace a band; all bands must share one grid
    pub fn add_band(&mut self, name: impl Into<String>, band: MaskedBand) -> WaterResult<()> {
        if band.mask.dim() != band.data.dim() {
            return Err(WaterError::ShapeMismatch {
                expected: band.data.dim(),
                found: band.mask.dim(),
            });
        }
        if let Some(dim) = self.dim() {
            if dim != band.dim() {
                return Err(WaterError::ShapeMismatch {
                    expected: dim,
                    found: band.dim(),
                });
            }
        }
        self.bands.insert(name.into(), band);
        Ok(())
    }

    pub fn with_band(mut self, name: impl Into<String>, band: MaskedBand) -> WaterResult<Self> {
        self.add_band(name, band)?;
        Ok(self)
    }

    /// Grid dimensions, `None` for a scene without bands
    pub fn dim(&self) -> Option<(usize, usize)> {
        self.bands.values().next().map(MaskedBand::dim)
    }

    pub fn band(&self, name: &str) -> WaterResult<&MaskedBand> {
        self.bands.get(name).ok_or_else(|| WaterError::MissingBand {
            scene: self.id.clone(),
            band: name.to_string(),
        })
    }

    /// Derive a scene holding only the listed bands, renamed as `(new, old)` pairs
    pub fn select_bands<'b, I>(&self, renames: I) -> WaterResult<Scene>
    where
        I: IntoIterator<Item = (&'b str, &'b str)>,
    {
        let mut bands = BTreeMap::new();
        for (new_name, old_name) in renames {
            bands.insert(new_name.to_string(), self.band(old_name)?.clone());
        }

        Ok(Scene {
            id: self.id.clone(),
            mission: self.mission,
            time_start: self.time_start,
            geo_transform: self.geo_transform,
            crs: self.crs,
            footprint: self.footprint.clone(),
            bands,
            properties: self.properties.clone(),
            acceptance: self.acceptance,
        })
    }

    pub fn bands(&self) -> &BTreeMap<String, MaskedBand> {
        &self.bands
    }

    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.bands.keys().map(String::as_str)
    }

    pub fn remove_band(&mut self, name: &str) -> Option<MaskedBand> {
        self.bands.remove(name)
    }

    /// Mask every band with `mask`
    pub fn update_mask(&mut self, mask: &ValidityMask) -> WaterResult<()> {
        for band in self.bands.values_mut() {
            band.update_mask(mask)?;
        }
        Ok(())
    }

    /// Pixels valid in every band (minimum of the per-band masks)
    pub fn common_mask(&self) -> Option<ValidityMask> {
        let mut bands = self.bands.values();
        let mut mask = bands.next()?.mask.clone();
        for band in bands {
            Zip::from(&mut mask)
                .and(&band.mask)
                .for_each(|m, &other| *m = *m && other);
        }
        Some(mask)
    }

    pub fn acceptance(&self) -> Acceptance {
        self.acceptance
    }

    pub fn is_accepted(&self) -> bool {
        self.acceptance == Acceptance::Accepted
    }

    /// Mark the scene rejected; an earlier rejection reason is kept
    pub fn reject(&mut self, reason: RejectReason) {
        if self.acceptance == Acceptance::Accepted {
            self.acceptance = Acceptance::Rejected(reason);
        }
    }

    /// Capture time as seen by date filters; `None` once rejected
    pub fn effective_time(&self) -> Option<DateTime<Utc>> {
        match self.acceptance {
            Acceptance::Accepted => Some(self.time_start),
            Acceptance::Rejected(_) => None,
        }
    }

    pub fn property(&self, key: &str) -> Option<f64> {
        self.properties.get(key).copied()
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: f64) {
        self.properties.insert(key.into(), value);
    }
}
