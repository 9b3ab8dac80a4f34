use crate::config::QaBits;
use crate::scene::{MaskedBand, Scene};
use crate::types::*;
use ndarray::Zip;

/// Produces a validity mask from the CFMASK `pixel_qa` band.
///
/// Implementations differ only in which flag combination marks a pixel bad;
/// masking is then applied to every band of the scene.
pub trait CloudMask: Send + Sync {
    /// Sensor family whose QA encoding this mask understands
    fn family(&self) -> SensorFamily;

    /// True when the QA word flags cloud or cloud shadow
    fn is_bad(&self, qa: u16) -> bool;

    /// Whether pixels missing from any band are dropped as well
    fn drops_edge_pixels(&self) -> bool {
        false
    }

    /// Valid where the QA pixel is itself valid and not flagged
    fn validity(&self, qa: &MaskedBand) -> ValidityMask {
        Zip::from(&qa.data)
            .and(&qa.mask)
            .map_collect(|&value, &valid| valid && !self.is_bad(value as u16))
    }

    /// Derive a cloud-masked scene
    fn apply(&self, scene: &Scene) -> WaterResult<Scene> {
        let clear = self.validity(scene.band(BAND_QA)?);
        let edge = if self.drops_edge_pixels() {
            scene.common_mask()
        } else {
            None
        };

        let mut out = scene.clone();
        out.update_mask(&clear)?;
        if let Some(edge) = edge {
            out.update_mask(&edge)?;
        }

        log::debug!(
            "{} ({}): {} of {} pixels clear",
            scene.id,
            self.family(),
            clear.iter().filter(|&&c| c).count(),
            clear.len()
        );
        Ok(out)
    }
}

#[inline]
fn bit(qa: u16, position: u8) -> bool {
    position < 16 && qa & (1u16 << position) != 0
}

/// Landsat 4/5 rule: cloud with high confidence, or cloud shadow; edge pixels dropped
#[derive(Debug, Clone, Copy)]
pub struct LegacyCloudMask {
    bits: QaBits,
}

impl LegacyCloudMask {
    pub fn new(bits: QaBits) -> Self {
        Self { bits }
    }
}

impl CloudMask for LegacyCloudMask {
    fn family(&self) -> SensorFamily {
        SensorFamily::Legacy
    }

    fn is_bad(&self, qa: u16) -> bool {
        (bit(qa, self.bits.cloud) && bit(qa, self.bits.cloud_confidence))
            || bit(qa, self.bits.cloud_shadow)
    }

    fn drops_edge_pixels(&self) -> bool {
        true
    }
}

/// Landsat 8 rule: any cloud or cloud-shadow flag
#[derive(Debug, Clone, Copy)]
pub struct OliCloudMask {
    bits: QaBits,
}

impl OliCloudMask {
    pub fn new(bits: QaBits) -> Self {
        Self { bits }
    }
}

impl CloudMask for OliCloudMask {
    fn family(&self) -> SensorFamily {
        SensorFamily::Oli
    }

    fn is_bad(&self, qa: u16) -> bool {
        bit(qa, self.bits.cloud_shadow) || bit(qa, self.bits.cloud)
    }
}

/// Cloud mask matching a sensor family
pub fn cloud_mask_for(family: SensorFamily, bits: QaBits) -> Box<dyn CloudMask> {
    match family {
        SensorFamily::Legacy => Box::new(LegacyCloudMask::new(bits)),
        SensorFamily::Oli => Box::new(OliCloudMask::new(bits)),
    }
}
