use crate::config::BandMap;
use crate::scene::Scene;
use crate::types::WaterResult;

/// Select the family's raw bands and rename them to the canonical scheme
pub fn harmonize(scene: &Scene, band_map: &BandMap) -> WaterResult<Scene> {
    scene.select_bands(band_map.iter())
}
