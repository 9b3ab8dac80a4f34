use crate::core::sampling::METRES_PER_DEGREE;
use crate::scene::{MaskedBand, RejectReason, Scene};
use crate::types::*;
use geo::{Area, BooleanOps, BoundingRect, Contains, Coord, Intersects, Line, MultiPolygon, Point, Polygon};
use ndarray::Array2;

/// Reservoir boundary in the analysis coordinate system
#[derive(Debug, Clone)]
pub struct Roi {
    geometry: MultiPolygon<f64>,
    crs: CoordinateSystem,
    bounds: (f64, f64, f64, f64),
    area: f64,
}

impl Roi {
    pub fn new(geometry: MultiPolygon<f64>, crs: CoordinateSystem) -> WaterResult<Self> {
        let rect = geometry
            .bounding_rect()
            .ok_or_else(|| WaterError::InvalidGeometry("ROI geometry is empty".to_string()))?;

        let area = geometry.unsigned_area();
        if !(area.is_finite() && area > 0.0) {
            return Err(WaterError::InvalidGeometry(format!(
                "ROI area must be positive, got {}",
                area
            )));
        }

        Ok(Self {
            geometry,
            crs,
            bounds: (rect.min().x, rect.min().y, rect.max().x, rect.max().y),
            area,
        })
    }

    pub fn from_polygon(polygon: Polygon<f64>, crs: CoordinateSystem) -> WaterResult<Self> {
        Self::new(MultiPolygon::new(vec![polygon]), crs)
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn crs(&self) -> CoordinateSystem {
        self.crs
    }

    /// (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.bounds
    }

    /// Planar area in CRS units (degrees² for a geographic ROI)
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Convert a planar area in CRS units to square metres near the ROI
    pub fn ground_area(&self, crs_area: f64) -> f64 {
        match self.crs {
            CoordinateSystem::Projected { .. } => crs_area,
            CoordinateSystem::Geographic => {
                let mid_lat = 0.5 * (self.bounds.1 + self.bounds.3);
                crs_area * METRES_PER_DEGREE * METRES_PER_DEGREE * mid_lat.to_radians().cos()
            }
        }
    }

    /// Strict interior test; boundary points are outside
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        let (min_x, min_y, max_x, max_y) = self.bounds;
        if x < min_x || x > max_x || y < min_y || y > max_y {
            return false;
        }
        self.geometry.contains(&Point::new(x, y))
    }

    pub fn intersects(&self, polygon: &Polygon<f64>) -> bool {
        self.geometry.0.iter().any(|p| p.intersects(polygon))
    }

    /// Part of the ROI outside `polygon`; empty when `polygon` covers it
    pub fn uncovered(&self, polygon: &Polygon<f64>) -> MultiPolygon<f64> {
        if self.geometry.0.iter().all(|p| polygon.contains(p)) {
            return MultiPolygon::new(vec![]);
        }
        self.geometry.difference(&MultiPolygon::new(vec![polygon.clone()]))
    }

    /// Ground distance in metres from (x, y) to `polygon`; zero inside it
    pub fn ground_distance(&self, polygon: &Polygon<f64>, x: f64, y: f64) -> f64 {
        if polygon.contains(&Point::new(x, y)) {
            return 0.0;
        }
        let (kx, ky) = match self.crs {
            CoordinateSystem::Projected { .. } => (1.0, 1.0),
            CoordinateSystem::Geographic => (
                METRES_PER_DEGREE * y.to_radians().cos(),
                METRES_PER_DEGREE,
            ),
        };
        std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .flat_map(|ring| ring.lines())
            .map(|line| scaled_segment_distance(&line, x, y, kx, ky))
            .fold(f64::INFINITY, f64::min)
    }

    /// Pixels of a grid whose centre lies inside the ROI
    pub fn pixel_mask(&self, gt: &GeoTransform, dim: (usize, usize)) -> ValidityMask {
        Array2::from_shape_fn(dim, |(row, col)| {
            let (x, y) = gt.pixel_to_geo(row, col);
            self.contains_point(x, y)
        })
    }

    /// Fail when a scene is not on the ROI's coordinate system
    pub fn ensure_same_crs(&self, scene: &Scene) -> WaterResult<()> {
        if scene.crs != self.crs {
            return Err(WaterError::CrsMismatch {
                expected: self.crs,
                found: scene.crs,
            });
        }
        Ok(())
    }
}

/// Distance from (x, y) to a segment after scaling each axis to metres
fn scaled_segment_distance(line: &Line<f64>, x: f64, y: f64, kx: f64, ky: f64) -> f64 {
    let (dx, dy) = (line.dx() * kx, line.dy() * ky);
    let (px, py) = ((x - line.start.x) * kx, (y - line.start.y) * ky);
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        ((px * dx + py * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (px - t * dx).hypot(py - t * dy)
}

/// Rejects scenes whose footprint does not fully cover the ROI
pub struct GeometryFilter<'a> {
    roi: &'a Roi,
    /// Ground distance (metres) by which the footprint may miss the ROI boundary
    error_margin: f64,
    /// Band whose mask the diagnostic flag band inherits
    flag_template_band: String,
}

impl<'a> GeometryFilter<'a> {
    pub fn new(roi: &'a Roi, error_margin: f64, flag_template_band: impl Into<String>) -> Self {
        Self {
            roi,
            error_margin,
            flag_template_band: flag_template_band.into(),
        }
    }

    /// True when every vertex and edge midpoint of `gap` lies within the margin of `footprint`
    fn gap_within_margin(&self, gap: &MultiPolygon<f64>, footprint: &Polygon<f64>) -> bool {
        gap.0
            .iter()
            .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
            .flat_map(|ring| ring.lines())
            .flat_map(|line| {
                let mid = Coord {
                    x: 0.5 * (line.start.x + line.end.x),
                    y: 0.5 * (line.start.y + line.end.y),
                };
                [line.start, mid]
            })
            .all(|c| self.roi.ground_distance(footprint, c.x, c.y) <= self.error_margin)
    }

    /// Full-cover test.
    ///
    /// Accepts when the footprint covers the ROI up to `error_margin` along its
    /// boundary. Returns the decision and the covered area in CRS units.
    pub fn covers_roi(&self, footprint: &Polygon<f64>) -> (bool, f64) {
        if !self.roi.intersects(footprint) {
            return (false, 0.0);
        }
        let gap = self.roi.uncovered(footprint);
        let intersection = (self.roi.area() - gap.unsigned_area()).max(0.0);
        (self.gap_within_margin(&gap, footprint), intersection)
    }

    /// Derive a scene carrying the overlap decision
    pub fn apply(&self, scene: &Scene) -> WaterResult<Scene> {
        self.roi.ensure_same_crs(scene)?;

        let (accept, intersection) = self.covers_roi(&scene.footprint);
        let intersection = self.roi.ground_area(intersection);
        log::debug!(
            "{}: intersection {:.1} / ROI {:.1} m2 -> {}",
            scene.id,
            intersection,
            self.roi.ground_area(self.roi.area()),
            if accept { "full cover" } else { "partial" }
        );

        let template = scene.band(&self.flag_template_band)?;
        let flag = MaskedBand::constant_like(&template.mask, if accept { 1.0 } else { 0.0 });

        let mut out = scene.clone();
        out.add_band(BAND_GEOMETRY_FLAG, flag)?;
        out.set_property(PROP_INTERSECTION_AREA, intersection);
        if !accept {
            out.reject(RejectReason::PartialOverlap);
        }
        Ok(out)
    }
}
