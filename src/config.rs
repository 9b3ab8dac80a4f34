//! Run configuration passed explicitly into every processing stage.

use crate::types::*;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Canonical band name -> raw band name in the source collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandMap(pub BTreeMap<String, String>);

impl BandMap {
    /// Build from (canonical, raw) pairs
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(canonical, raw)| (canonical.to_string(), raw.to_string()))
                .collect(),
        )
    }

    /// Landsat 4/5 surface reflectance already uses the canonical names
    pub fn legacy() -> Self {
        Self::from_pairs(&[
            (BAND_BLUE, "B1"),
            (BAND_GREEN, "B2"),
            (BAND_RED, "B3"),
            (BAND_NIR, "B4"),
            (BAND_MIR, "B5"),
            (BAND_QA, "pixel_qa"),
        ])
    }

    /// Landsat 8 bands are shifted by one (B1 is coastal aerosol)
    pub fn oli() -> Self {
        Self::from_pairs(&[
            (BAND_BLUE, "B2"),
            (BAND_GREEN, "B3"),
            (BAND_RED, "B4"),
            (BAND_NIR, "B5"),
            (BAND_MIR, "B6"),
            (BAND_QA, "pixel_qa"),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(c, r)| (c.as_str(), r.as_str()))
    }
}

/// Band maps for each sensor family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandMaps {
    pub legacy: BandMap,
    pub oli: BandMap,
}

impl Default for BandMaps {
    fn default() -> Self {
        Self {
            legacy: BandMap::legacy(),
            oli: BandMap::oli(),
        }
    }
}

impl BandMaps {
    pub fn for_family(&self, family: SensorFamily) -> &BandMap {
        match family {
            SensorFamily::Legacy => &self.legacy,
            SensorFamily::Oli => &self.oli,
        }
    }
}

/// Bit positions in the CFMASK `pixel_qa` band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaBits {
    pub cloud_shadow: u8,
    pub cloud: u8,
    pub cloud_confidence: u8,
}

impl Default for QaBits {
    fn default() -> Self {
        Self {
            cloud_shadow: 3,
            cloud: 5,
            cloud_confidence: 7, // high bit of the two-bit confidence field
        }
    }
}

/// Bands feeding the normalized difference water index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterIndexBands {
    pub green: String,
    pub mir: String,
}

impl Default for WaterIndexBands {
    fn default() -> Self {
        Self {
            green: BAND_GREEN.to_string(),
            mir: BAND_MIR.to_string(),
        }
    }
}

/// Half-open analysis window `[start, end)` at UTC midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: &DateTime<Utc>) -> bool {
        let day_start = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        match (day_start(self.start), day_start(self.end)) {
            (Some(start), Some(end)) => *time >= start && *time < end,
            _ => false,
        }
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(1982, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2019, 12, 31).unwrap_or_default(),
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw band names per sensor family
    pub bands: BandMaps,
    /// Quality band bit positions
    pub qa_bits: QaBits,
    /// Minimum valid-area / reservoir-area ratio (1.0 = no cloud at all)
    pub coverage_threshold: f64,
    /// Index cutoff; pixels strictly above it are water
    pub water_threshold: f32,
    /// Sampling resolution for ROI reductions (ground units)
    pub scale: f64,
    /// Spatial reference shared by ROI, scenes and area computation
    pub analysis_crs: CoordinateSystem,
    /// Distance in metres by which a footprint may miss the ROI boundary
    pub error_margin: f64,
    /// Band whose valid pixels define coverage
    pub coverage_band: String,
    /// Band pair for the water index
    pub water_index: WaterIndexBands,
    /// Analysis window
    pub date_range: DateRange,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bands: BandMaps::default(),
            qa_bits: QaBits::default(),
            coverage_threshold: 1.0,
            water_threshold: 0.0,
            scale: 30.0,
            analysis_crs: CoordinateSystem::Projected { epsg: 3763 }, // PT-TM06/ETRS89
            error_margin: 1.0,
            coverage_band: BAND_RED.to_string(),
            water_index: WaterIndexBands::default(),
            date_range: DateRange::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document; absent keys keep their defaults
    pub fn from_toml_str(text: &str) -> WaterResult<Self> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_toml_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::info!("Loaded pipeline configuration from {}", path.display());
        Ok(config)
    }

    /// Reject values that would make the reductions meaningless
    pub fn validate(&self) -> WaterResult<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(WaterError::Processing(format!(
                "Sampling scale must be positive, got {}",
                self.scale
            )));
        }
        if !(0.0..=1.0).contains(&self.coverage_threshold) {
            return Err(WaterError::Processing(format!(
                "Coverage threshold must lie in [0, 1], got {}",
                self.coverage_threshold
            )));
        }
        if !self.water_threshold.is_finite() {
            return Err(WaterError::Processing(format!(
                "Water index cutoff must be finite, got {}",
                self.water_threshold
            )));
        }
        if !(self.error_margin.is_finite() && self.error_margin >= 0.0) {
            return Err(WaterError::Processing(format!(
                "Error margin must be non-negative, got {}",
                self.error_margin
            )));
        }
        if self.date_range.start >= self.date_range.end {
            return Err(WaterError::Processing(format!(
                "Empty date range {} .. {}",
                self.date_range.start, self.date_range.end
            )));
        }
        Ok(())
    }
}
