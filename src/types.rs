use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Real-valued reflectance or derived band data
pub type BandReal = f32;

/// 2D band data array (rows x cols)
pub type BandImage = Array2<BandReal>;

/// 2D validity mask (true = valid pixel)
pub type ValidityMask = Array2<bool>;

/// Canonical band names shared by every sensor family after harmonisation
pub const BAND_BLUE: &str = "B1";
pub const BAND_GREEN: &str = "B2";
pub const BAND_RED: &str = "B3";
pub const BAND_NIR: &str = "B4";
pub const BAND_MIR: &str = "B5";
pub const BAND_QA: &str = "pixel_qa";

/// Derived band names written by the processing stages
pub const BAND_GEOMETRY_FLAG: &str = "B98";
pub const BAND_COVERAGE_FLAG: &str = "B99";
pub const BAND_NDWI: &str = "NDWI";
pub const BAND_WATER_AREA: &str = "waterArea";

/// Property keys attached to scenes
pub const PROP_WATER_AREA: &str = "waterArea";
pub const PROP_COVERAGE_RATIO: &str = "coverage_ratio";
pub const PROP_INTERSECTION_AREA: &str = "intersection_area";

/// Coordinate system enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    /// Geographic coordinates (longitude, latitude in degrees)
    Geographic,
    /// Projected coordinates in metres (e.g., EPSG:3763 PT-TM06)
    Projected { epsg: u32 },
}

impl std::fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinateSystem::Geographic => write!(f, "EPSG:4326"),
            CoordinateSystem::Projected { epsg } => write!(f, "EPSG:{}", epsg),
        }
    }
}

/// Landsat missions supported by the surface-reflectance collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mission {
    Landsat4,
    Landsat5,
    Landsat8,
}

impl Mission {
    /// Sensor family that decides band layout and cloud-mask rule
    pub fn family(&self) -> SensorFamily {
        match self {
            Mission::Landsat4 | Mission::Landsat5 => SensorFamily::Legacy,
            Mission::Landsat8 => SensorFamily::Oli,
        }
    }
}

impl std::fmt::Display for Mission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mission::Landsat4 => write!(f, "LT04"),
            Mission::Landsat5 => write!(f, "LT05"),
            Mission::Landsat8 => write!(f, "LC08"),
        }
    }
}

/// Sensor family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorFamily {
    /// Thematic Mapper (Landsat 4/5)
    Legacy,
    /// Operational Land Imager (Landsat 8)
    Oli,
}

impl std::fmt::Display for SensorFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorFamily::Legacy => write!(f, "TM"),
            SensorFamily::Oli => write!(f, "OLI"),
        }
    }
}

/// North-up affine grid parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub top_left_y: f64,
    pub pixel_height: f64, // negative for north-up
}

impl GeoTransform {
    pub fn new(top_left_x: f64, top_left_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            top_left_x,
            pixel_width,
            top_left_y,
            pixel_height,
        }
    }

    /// Centre of pixel (row, col) in grid coordinates
    pub fn pixel_to_geo(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.top_left_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.top_left_y + (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }

    /// Pixel containing (x, y), or `None` when the point falls outside a grid of `dim`
    pub fn geo_to_pixel(&self, x: f64, y: f64, dim: (usize, usize)) -> Option<(usize, usize)> {
        let col = ((x - self.top_left_x) / self.pixel_width).floor();
        let row = ((y - self.top_left_y) / self.pixel_height).floor();

        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }

        let (row, col) = (row as usize, col as usize);
        if row < dim.0 && col < dim.1 {
            Some((row, col))
        } else {
            None
        }
    }

    /// Extent of a grid of `dim` as (min_x, min_y, max_x, max_y)
    pub fn extent(&self, dim: (usize, usize)) -> (f64, f64, f64, f64) {
        let x0 = self.top_left_x;
        let x1 = self.top_left_x + dim.1 as f64 * self.pixel_width;
        let y0 = self.top_left_y;
        let y1 = self.top_left_y + dim.0 as f64 * self.pixel_height;
        (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}

/// Error types for reservoir water processing
#[derive(Debug, thiserror::Error)]
pub enum WaterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Scene {scene} has no band '{band}'")]
    MissingBand { scene: String, band: String },

    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Coordinate system mismatch: expected {expected}, found {found}")]
    CrsMismatch {
        expected: CoordinateSystem,
        found: CoordinateSystem,
    },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for reservoir water operations
pub type WaterResult<T> = Result<T, WaterError>;
