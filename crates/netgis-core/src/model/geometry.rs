// ── Geometry domain types ──
//
// The server speaks `[lng, lat]` arrays; the map speaks `{latitude,
// longitude}` objects. `Shape<C>` carries the same structure in either
// coordinate system so conversion is a pure per-vertex map and the round
// trip is exact.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use netgis_api::RawCoordinates;

use crate::error::CoreError;

// ── Coordinates ─────────────────────────────────────────────────────

/// Server-format coordinate, serialized as `[lng, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LngLat(pub [f64; 2]);

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self([lng, lat])
    }

    pub const fn lng(self) -> f64 {
        self.0[0]
    }

    pub const fn lat(self) -> f64 {
        self.0[1]
    }
}

/// Display-format coordinate, serialized as `{latitude, longitude}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<LngLat> for LatLng {
    fn from(c: LngLat) -> Self {
        Self::new(c.lat(), c.lng())
    }
}

impl From<LatLng> for LngLat {
    fn from(c: LatLng) -> Self {
        Self::new(c.longitude, c.latitude)
    }
}

impl From<LatLng> for geo::Coord<f64> {
    fn from(c: LatLng) -> Self {
        geo::Coord {
            x: c.longitude,
            y: c.latitude,
        }
    }
}

// ── FeatureType ─────────────────────────────────────────────────────

/// Geometry kind of a layer. Closed set; behaviour per kind lives in
/// [`crate::registry::GeometryStrategy`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum FeatureType {
    Point,
    Polyline,
    Polygon,
    MultiPolygon,
}

// ── Shape ───────────────────────────────────────────────────────────

/// A geometry in some coordinate system `C`.
///
/// Polygons hold their outer ring only; multipolygons hold one outer ring
/// per part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Shape<C> {
    Point(C),
    Polyline(Vec<C>),
    Polygon(Vec<C>),
    MultiPolygon(Vec<Vec<C>>),
}

/// Geometry as stored and validated by the server.
pub type ServerGeometry = Shape<LngLat>;

/// Geometry as handed to the map.
pub type DisplayGeometry = Shape<LatLng>;

impl<C: Copy> Shape<C> {
    pub fn feature_type(&self) -> FeatureType {
        match self {
            Self::Point(_) => FeatureType::Point,
            Self::Polyline(_) => FeatureType::Polyline,
            Self::Polygon(_) => FeatureType::Polygon,
            Self::MultiPolygon(_) => FeatureType::MultiPolygon,
        }
    }

    /// Apply `f` to every vertex, keeping the structure.
    pub fn map<D>(&self, f: impl Fn(C) -> D) -> Shape<D> {
        match self {
            Self::Point(c) => Shape::Point(f(*c)),
            Self::Polyline(cs) => Shape::Polyline(cs.iter().copied().map(&f).collect()),
            Self::Polygon(cs) => Shape::Polygon(cs.iter().copied().map(&f).collect()),
            Self::MultiPolygon(rings) => Shape::MultiPolygon(
                rings
                    .iter()
                    .map(|r| r.iter().copied().map(&f).collect())
                    .collect(),
            ),
        }
    }

    /// All vertices, flattened across rings.
    pub fn vertices(&self) -> Vec<C> {
        match self {
            Self::Point(c) => vec![*c],
            Self::Polyline(cs) | Self::Polygon(cs) => cs.clone(),
            Self::MultiPolygon(rings) => rings.iter().flatten().copied().collect(),
        }
    }
}

impl ServerGeometry {
    /// Interpret raw server coordinates as a geometry of `feature_type`.
    ///
    /// A polygon may arrive as a one-ring list and a multipolygon as a
    /// bare ring; anything else that does not fit is a shape mismatch.
    pub fn from_raw(raw: &RawCoordinates, feature_type: FeatureType) -> Result<Self, CoreError> {
        let ring = |r: &Vec<[f64; 2]>| r.iter().copied().map(LngLat).collect::<Vec<_>>();
        let shape = match (feature_type, raw) {
            (FeatureType::Point, RawCoordinates::Point(c)) => Self::Point(LngLat(*c)),
            (FeatureType::Polyline, RawCoordinates::Path(p)) => Self::Polyline(ring(p)),
            (FeatureType::Polygon, RawCoordinates::Path(p)) => Self::Polygon(ring(p)),
            (FeatureType::Polygon, RawCoordinates::Rings(rings)) if rings.len() == 1 => {
                Self::Polygon(ring(&rings[0]))
            }
            (FeatureType::MultiPolygon, RawCoordinates::Rings(rings)) => {
                Self::MultiPolygon(rings.iter().map(ring).collect())
            }
            (FeatureType::MultiPolygon, RawCoordinates::Path(p)) => {
                Self::MultiPolygon(vec![ring(p)])
            }
            _ => {
                return Err(CoreError::GeometryShapeMismatch {
                    expected: feature_type,
                    found: raw_kind(raw).into(),
                });
            }
        };
        Ok(shape)
    }

    /// Back to the untyped wire form.
    pub fn to_raw(&self) -> RawCoordinates {
        let ring = |r: &Vec<LngLat>| r.iter().map(|c| c.0).collect::<Vec<_>>();
        match self {
            Self::Point(c) => RawCoordinates::Point(c.0),
            Self::Polyline(cs) | Self::Polygon(cs) => RawCoordinates::Path(ring(cs)),
            Self::MultiPolygon(rings) => RawCoordinates::Rings(rings.iter().map(ring).collect()),
        }
    }

    pub fn to_display(&self) -> DisplayGeometry {
        self.map(LatLng::from)
    }
}

impl DisplayGeometry {
    pub fn to_server(&self) -> ServerGeometry {
        self.map(LngLat::from)
    }

    /// Equivalent `geo` geometry (x = longitude, y = latitude).
    pub fn to_geo(&self) -> geo::Geometry<f64> {
        let line = |cs: &[LatLng]| {
            geo::LineString::new(cs.iter().copied().map(geo::Coord::from).collect())
        };
        match self {
            Self::Point(c) => geo::Geometry::Point(geo::Point::from(geo::Coord::from(*c))),
            Self::Polyline(cs) => geo::Geometry::LineString(line(cs)),
            Self::Polygon(cs) => geo::Geometry::Polygon(geo::Polygon::new(line(cs), Vec::new())),
            Self::MultiPolygon(rings) => geo::Geometry::MultiPolygon(geo::MultiPolygon::new(
                rings
                    .iter()
                    .map(|r| geo::Polygon::new(line(r), Vec::new()))
                    .collect(),
            )),
        }
    }

    /// Axis-aligned bounds; `None` for a geometry without vertices.
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.vertices())
    }

    /// Arithmetic mean of the vertices.
    pub fn center(&self) -> Option<LatLng> {
        let vertices = self.vertices();
        if vertices.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = vertices.len() as f64;
        let (lat, lng) = vertices
            .iter()
            .fold((0.0, 0.0), |(a, o), c| (a + c.latitude, o + c.longitude));
        Some(LatLng::new(lat / n, lng / n))
    }
}

fn raw_kind(raw: &RawCoordinates) -> &'static str {
    match raw {
        RawCoordinates::Point(_) => "point",
        RawCoordinates::Path(_) => "path",
        RawCoordinates::Rings(_) => "ring list",
    }
}

// ── BoundingBox ─────────────────────────────────────────────────────

/// Axis-aligned box in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn from_points(points: impl IntoIterator<Item = LatLng>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let init = Self {
            south: first.latitude,
            west: first.longitude,
            north: first.latitude,
            east: first.longitude,
        };
        Some(iter.fold(init, |b, p| Self {
            south: b.south.min(p.latitude),
            west: b.west.min(p.longitude),
            north: b.north.max(p.latitude),
            east: b.east.max(p.longitude),
        }))
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.west <= other.east
            && other.west <= self.east
            && self.south <= other.north
            && other.south <= self.north
    }

    /// Grow by `margin` degrees on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            south: self.south - margin,
            west: self.west - margin,
            north: self.north + margin,
            east: self.east + margin,
        }
    }

    pub fn contains(&self, p: LatLng) -> bool {
        (self.south..=self.north).contains(&p.latitude)
            && (self.west..=self.east).contains(&p.longitude)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn samples() -> Vec<ServerGeometry> {
        let ring = vec![
            LngLat::new(77.0, 12.0),
            LngLat::new(77.1, 12.0),
            LngLat::new(77.1, 12.1),
            LngLat::new(77.0, 12.0),
        ];
        vec![
            Shape::Point(LngLat::new(77.59, 12.97)),
            Shape::Polyline(vec![LngLat::new(77.0, 12.0), LngLat::new(77.2, 12.3)]),
            Shape::Polygon(ring.clone()),
            Shape::MultiPolygon(vec![ring.clone(), ring]),
        ]
    }

    #[test]
    fn display_roundtrip_is_exact_for_every_feature_type() {
        for g in samples() {
            let back = g.to_display().to_server();
            assert_eq!(back, g);
        }
    }

    #[test]
    fn display_swaps_axes() {
        let d = Shape::Point(LngLat::new(77.59, 12.97)).to_display();
        assert_eq!(d, Shape::Point(LatLng::new(12.97, 77.59)));
    }

    #[test]
    fn raw_roundtrip_matches_feature_type() {
        for g in samples() {
            let raw = g.to_raw();
            let parsed = ServerGeometry::from_raw(&raw, g.feature_type()).unwrap();
            assert_eq!(parsed, g);
        }
    }

    #[test]
    fn raw_shape_mismatch_is_rejected() {
        let raw = RawCoordinates::Point([1.0, 2.0]);
        let err = ServerGeometry::from_raw(&raw, FeatureType::Polyline).unwrap_err();
        assert!(matches!(
            err,
            CoreError::GeometryShapeMismatch {
                expected: FeatureType::Polyline,
                ..
            }
        ));
    }

    #[test]
    fn single_ring_list_is_a_polygon() {
        let raw = RawCoordinates::Rings(vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]]);
        let g = ServerGeometry::from_raw(&raw, FeatureType::Polygon).unwrap();
        assert_eq!(g.feature_type(), FeatureType::Polygon);
    }

    #[test]
    fn bounds_and_center() {
        let g = Shape::Polyline(vec![LatLng::new(0.0, 0.0), LatLng::new(2.0, 4.0)]);
        let b = g.bounds().unwrap();
        assert_eq!((b.south, b.west, b.north, b.east), (0.0, 0.0, 2.0, 4.0));
        assert_eq!(g.center().unwrap(), LatLng::new(1.0, 2.0));
        assert!(b.contains(LatLng::new(1.0, 1.0)));
        assert!(!b.contains(LatLng::new(3.0, 1.0)));
    }

    #[test]
    fn bounding_boxes_touching_edges_intersect() {
        let a = BoundingBox::from_points([LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)]).unwrap();
        let b = BoundingBox::from_points([LatLng::new(1.0, 1.0), LatLng::new(2.0, 2.0)]).unwrap();
        let c = BoundingBox::from_points([LatLng::new(5.0, 5.0), LatLng::new(6.0, 6.0)]).unwrap();
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
