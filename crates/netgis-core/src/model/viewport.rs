// ── Viewport types ──

use serde::{Deserialize, Serialize};

use super::geometry::{BoundingBox, LatLng};

/// Visible map area as reported by the map widget: centre plus span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRegion {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

/// Four corners of the visible map plus the zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportBounds {
    pub north_east: LatLng,
    pub north_west: LatLng,
    pub south_west: LatLng,
    pub south_east: LatLng,
    pub zoom: f64,
}

impl ViewportBounds {
    /// Axis-aligned viewport from its north-east and south-west corners.
    pub fn from_corners(north_east: LatLng, south_west: LatLng, zoom: f64) -> Self {
        Self {
            north_east,
            north_west: LatLng::new(north_east.latitude, south_west.longitude),
            south_west,
            south_east: LatLng::new(south_west.latitude, north_east.longitude),
            zoom,
        }
    }

    /// Viewport of a centre/span map region; zoom is `log2(360 / lng span)`.
    pub fn from_region(region: MapRegion) -> Self {
        let half_lat = region.latitude_delta / 2.0;
        let half_lng = region.longitude_delta / 2.0;
        let north_east = LatLng::new(region.latitude + half_lat, region.longitude + half_lng);
        let south_west = LatLng::new(region.latitude - half_lat, region.longitude - half_lng);
        let zoom = if region.longitude_delta > 0.0 {
            (360.0 / region.longitude_delta).log2()
        } else {
            0.0
        };
        Self::from_corners(north_east, south_west, zoom)
    }

    /// Closed ring NE → NW → SW → SE → NE.
    pub fn ring(&self) -> [LatLng; 5] {
        [
            self.north_east,
            self.north_west,
            self.south_west,
            self.south_east,
            self.north_east,
        ]
    }

    /// Filter polygon for the spatial intersection test.
    pub fn to_polygon(&self) -> geo::Polygon<f64> {
        let ring: Vec<geo::Coord<f64>> = self.ring().into_iter().map(geo::Coord::from).collect();
        geo::Polygon::new(geo::LineString::new(ring), Vec::new())
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.ring()).unwrap_or(BoundingBox {
            south: self.south_west.latitude,
            west: self.south_west.longitude,
            north: self.north_east.latitude,
            east: self.north_east.longitude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_zoom_is_log2_of_span() {
        let vp = ViewportBounds::from_region(MapRegion {
            latitude: 12.0,
            longitude: 77.0,
            latitude_delta: 0.1,
            longitude_delta: 360.0 / 1024.0,
        });
        assert!((vp.zoom - 10.0).abs() < 1e-9);
        assert!(vp.north_east.latitude > vp.south_west.latitude);
        assert!(vp.north_east.longitude > vp.south_west.longitude);
    }

    #[test]
    fn bounding_box_spans_corners() {
        let vp = ViewportBounds::from_corners(LatLng::new(2.0, 3.0), LatLng::new(1.0, 1.0), 12.0);
        let b = vp.bounding_box();
        assert_eq!((b.south, b.west, b.north, b.east), (1.0, 1.0, 2.0, 3.0));
        assert_eq!(vp.north_west, LatLng::new(2.0, 1.0));
        assert_eq!(vp.south_east, LatLng::new(1.0, 3.0));
    }
}
