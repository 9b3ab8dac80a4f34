//! Ordered image collection with map / filter / merge.

use crate::config::DateRange;
use crate::core::geometry_filter::Roi;
use crate::scene::Scene;
use crate::types::WaterResult;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Ordered set of scenes
#[derive(Debug, Clone, Default)]
pub struct ImageCollection {
    scenes: Vec<Scene>,
}

impl ImageCollection {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn into_scenes(self) -> Vec<Scene> {
        self.scenes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scene> {
        self.scenes.iter()
    }

    /// Append the scenes of `other` after this collection's scenes
    pub fn merge(mut self, other: ImageCollection) -> Self {
        self.scenes.extend(other.scenes);
        self
    }

    /// Apply a fallible per-scene transform, preserving order
    #[cfg(feature = "parallel")]
    pub fn try_map<F>(&self, f: F) -> WaterResult<ImageCollection>
    where
        F: Fn(&Scene) -> WaterResult<Scene> + Sync + Send,
    {
        let scenes = self
            .scenes
            .par_iter()
            .map(|scene| f(scene))
            .collect::<WaterResult<Vec<_>>>()?;
        Ok(ImageCollection { scenes })
    }

    #[cfg(not(feature = "parallel"))]
    pub fn try_map<F>(&self, f: F) -> WaterResult<ImageCollection>
    where
        F: Fn(&Scene) -> WaterResult<Scene> + Sync + Send,
    {
        let scenes = self
            .scenes
            .iter()
            .map(|scene| f(scene))
            .collect::<WaterResult<Vec<_>>>()?;
        Ok(ImageCollection { scenes })
    }

    /// Keep scenes matching `predicate`
    pub fn filter<P>(self, predicate: P) -> Self
    where
        P: Fn(&Scene) -> bool,
    {
        Self {
            scenes: self.scenes.into_iter().filter(|s| predicate(s)).collect(),
        }
    }

    /// Keep scenes whose footprint touches the ROI
    pub fn filter_bounds(self, roi: &Roi) -> Self {
        self.filter(|scene| roi.intersects(&scene.footprint))
    }

    /// Keep accepted scenes captured inside `range`
    pub fn filter_date(self, range: &DateRange) -> Self {
        self.filter(|scene| {
            scene
                .effective_time()
                .map_or(false, |time| range.contains(&time))
        })
    }

    /// Stable sort by capture time; equal timestamps keep merge order
    pub fn sort_by_time(mut self) -> Self {
        self.scenes.sort_by_key(|scene| scene.time_start);
        self
    }
}

impl IntoIterator for ImageCollection {
    type Item = Scene;
    type IntoIter = std::vec::IntoIter<Scene>;

    fn into_iter(self) -> Self::IntoIter {
        self.scenes.into_iter()
    }
}

impl FromIterator<Scene> for ImageCollection {
    fn from_iter<I: IntoIterator<Item = Scene>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
