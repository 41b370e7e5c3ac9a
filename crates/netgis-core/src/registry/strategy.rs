// ── Per-feature-type geometry behaviour ──
//
// Everything that depends on a layer's geometry kind lives behind this
// trait: how taps build a shape, how many vertices a shape needs, and how
// a shape is tested against the viewport. Callers get a strategy from
// `FeatureType::strategy()` and never match on the kind themselves.

use geo::Intersects;

use crate::error::CoreError;
use crate::model::{DisplayGeometry, FeatureType, LatLng, Shape};

pub trait GeometryStrategy: Send + Sync {
    fn feature_type(&self) -> FeatureType;

    /// Vertices needed before a drawn shape may be confirmed.
    fn min_vertices(&self) -> usize;

    /// Vertex list after the user taps `tap`.
    fn accumulate(&self, vertices: &[LatLng], tap: LatLng) -> Vec<LatLng> {
        let mut next = vertices.to_vec();
        next.push(tap);
        next
    }

    /// Editable vertex list seeded from an existing geometry.
    fn seed(&self, geometry: &DisplayGeometry) -> Vec<LatLng>;

    /// Shape made from drawn vertices; fails below `min_vertices`.
    fn build(&self, vertices: &[LatLng]) -> Result<DisplayGeometry, CoreError>;

    /// Shape for a redrawn element. The vertices replace whatever part
    /// of `original` that `seed` handed out; the rest is kept.
    fn rebuild(
        &self,
        _original: &DisplayGeometry,
        vertices: &[LatLng],
    ) -> Result<DisplayGeometry, CoreError> {
        self.build(vertices)
    }

    fn require_vertices(&self, vertices: &[LatLng]) -> Result<(), CoreError> {
        if vertices.len() < self.min_vertices() {
            return Err(CoreError::IncompleteGeometry {
                feature_type: self.feature_type(),
                required: self.min_vertices(),
                actual: vertices.len(),
            });
        }
        Ok(())
    }

    /// Whether `geometry` touches `area`.
    fn intersects(&self, geometry: &DisplayGeometry, area: &geo::Polygon<f64>) -> bool;
}

fn line(cs: &[LatLng]) -> geo::LineString<f64> {
    geo::LineString::new(cs.iter().copied().map(geo::Coord::from).collect())
}

fn polygon(cs: &[LatLng]) -> geo::Polygon<f64> {
    geo::Polygon::new(line(cs), Vec::new())
}

// ── Point ───────────────────────────────────────────────────────────

pub struct PointStrategy;

impl GeometryStrategy for PointStrategy {
    fn feature_type(&self) -> FeatureType {
        FeatureType::Point
    }

    fn min_vertices(&self) -> usize {
        1
    }

    fn accumulate(&self, _vertices: &[LatLng], tap: LatLng) -> Vec<LatLng> {
        vec![tap]
    }

    fn seed(&self, geometry: &DisplayGeometry) -> Vec<LatLng> {
        geometry.vertices().into_iter().take(1).collect()
    }

    fn build(&self, vertices: &[LatLng]) -> Result<DisplayGeometry, CoreError> {
        match vertices.last() {
            Some(c) => Ok(Shape::Point(*c)),
            None => Err(CoreError::IncompleteGeometry {
                feature_type: FeatureType::Point,
                required: 1,
                actual: 0,
            }),
        }
    }

    fn intersects(&self, geometry: &DisplayGeometry, area: &geo::Polygon<f64>) -> bool {
        match geometry {
            Shape::Point(c) => geo::Point::from(geo::Coord::from(*c)).intersects(area),
            _ => false,
        }
    }
}

// ── Polyline ────────────────────────────────────────────────────────

pub struct PolylineStrategy;

impl GeometryStrategy for PolylineStrategy {
    fn feature_type(&self) -> FeatureType {
        FeatureType::Polyline
    }

    fn min_vertices(&self) -> usize {
        2
    }

    fn seed(&self, geometry: &DisplayGeometry) -> Vec<LatLng> {
        geometry.vertices()
    }

    fn build(&self, vertices: &[LatLng]) -> Result<DisplayGeometry, CoreError> {
        self.require_vertices(vertices)?;
        Ok(Shape::Polyline(vertices.to_vec()))
    }

    fn intersects(&self, geometry: &DisplayGeometry, area: &geo::Polygon<f64>) -> bool {
        match geometry {
            Shape::Polyline(cs) => line(cs).intersects(area),
            _ => false,
        }
    }
}

// ── Polygon ─────────────────────────────────────────────────────────

pub struct PolygonStrategy;

impl GeometryStrategy for PolygonStrategy {
    fn feature_type(&self) -> FeatureType {
        FeatureType::Polygon
    }

    fn min_vertices(&self) -> usize {
        3
    }

    fn seed(&self, geometry: &DisplayGeometry) -> Vec<LatLng> {
        geometry.vertices()
    }

    fn build(&self, vertices: &[LatLng]) -> Result<DisplayGeometry, CoreError> {
        self.require_vertices(vertices)?;
        Ok(Shape::Polygon(vertices.to_vec()))
    }

    fn intersects(&self, geometry: &DisplayGeometry, area: &geo::Polygon<f64>) -> bool {
        match geometry {
            Shape::Polygon(cs) => polygon(cs).intersects(area),
            _ => false,
        }
    }
}

// ── MultiPolygon ────────────────────────────────────────────────────

/// Drawing edits the outer ring of the first part; other parts ride along.
pub struct MultiPolygonStrategy;

impl GeometryStrategy for MultiPolygonStrategy {
    fn feature_type(&self) -> FeatureType {
        FeatureType::MultiPolygon
    }

    fn min_vertices(&self) -> usize {
        3
    }

    fn seed(&self, geometry: &DisplayGeometry) -> Vec<LatLng> {
        match geometry {
            Shape::MultiPolygon(rings) => rings.first().cloned().unwrap_or_default(),
            other => other.vertices(),
        }
    }

    fn build(&self, vertices: &[LatLng]) -> Result<DisplayGeometry, CoreError> {
        self.require_vertices(vertices)?;
        Ok(Shape::MultiPolygon(vec![vertices.to_vec()]))
    }

    fn rebuild(
        &self,
        original: &DisplayGeometry,
        vertices: &[LatLng],
    ) -> Result<DisplayGeometry, CoreError> {
        self.require_vertices(vertices)?;
        let mut parts = match original {
            Shape::MultiPolygon(parts) => parts.clone(),
            _ => Vec::new(),
        };
        match parts.first_mut() {
            Some(first) => *first = vertices.to_vec(),
            None => parts.push(vertices.to_vec()),
        }
        Ok(Shape::MultiPolygon(parts))
    }

    fn intersects(&self, geometry: &DisplayGeometry, area: &geo::Polygon<f64>) -> bool {
        match geometry {
            Shape::MultiPolygon(rings) => rings.iter().any(|r| polygon(r).intersects(area)),
            _ => false,
        }
    }
}

static POINT: PointStrategy = PointStrategy;
static POLYLINE: PolylineStrategy = PolylineStrategy;
static POLYGON: PolygonStrategy = PolygonStrategy;
static MULTI_POLYGON: MultiPolygonStrategy = MultiPolygonStrategy;

impl FeatureType {
    /// The single strategy implementing this kind.
    pub fn strategy(self) -> &'static dyn GeometryStrategy {
        match self {
            Self::Point => &POINT,
            Self::Polyline => &POLYLINE,
            Self::Polygon => &POLYGON,
            Self::MultiPolygon => &MULTI_POLYGON,
        }
    }
}
