use crate::scene::Scene;
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// One row of the water-area time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterAreaRecord {
    pub date: DateTime<Utc>,
    pub mission: String,
    pub scene_id: String,
    pub water_area_m2: f64,
    pub coverage_ratio: Option<f64>,
}

impl WaterAreaRecord {
    /// Row for a scored scene; `None` if the scene has no water area yet
    pub fn from_scene(scene: &Scene) -> Option<Self> {
        let water_area_m2 = scene.property(PROP_WATER_AREA)?;
        Some(Self {
            date: scene.time_start,
            mission: scene.mission.to_string(),
            scene_id: scene.id.clone(),
            water_area_m2,
            coverage_ratio: scene.property(PROP_COVERAGE_RATIO),
        })
    }
}

/// Write records as CSV with a header row
pub fn write_csv<W: Write>(records: &[WaterAreaRecord], writer: W) -> WaterResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write records to a CSV file, replacing any existing file
pub fn write_csv_file<P: AsRef<Path>>(records: &[WaterAreaRecord], path: P) -> WaterResult<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_csv(records, std::io::BufWriter::new(file))?;
    log::info!("Wrote {} water-area rows to {}", records.len(), path.as_ref().display());
    Ok(())
}
