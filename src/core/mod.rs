//! Core reservoir water-area processing stages

pub mod harmonize;
pub mod geometry_filter;
pub mod sampling;
pub mod cloud_mask;
pub mod coverage;
pub mod water_index;
pub mod pipeline;

// Re-export main types
pub use harmonize::harmonize;
pub use geometry_filter::{GeometryFilter, Roi};
pub use sampling::{SamplingGrid, SamplePoint, pixel_area, pixel_area_image};
pub use cloud_mask::{CloudMask, LegacyCloudMask, OliCloudMask, cloud_mask_for};
pub use coverage::CoverageFilter;
pub use water_index::{WaterScorer, normalized_difference, classify_water};
pub use pipeline::{WaterAreaPipeline, SourceCollections, PipelineOutput, StageReport};
