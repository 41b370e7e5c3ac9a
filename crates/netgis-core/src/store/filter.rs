// ── Spatial filtering ──
//
// Viewport narrowing of cached layers and tap hit-testing. Both run a
// cheap bounding-box rejection before the exact `geo` intersection test
// of the layer's geometry strategy.

use std::sync::Arc;

use crate::model::{BoundingBox, GisElement, LatLng, ViewportBounds};
use crate::registry::GeometryStrategy;

/// Tap tolerance in screen pixels.
const HIT_TOLERANCE_PX: f64 = 16.0;

/// Elements of `elements` that touch the viewport.
pub(crate) fn filter_to_viewport(
    elements: &[Arc<GisElement>],
    viewport: &ViewportBounds,
    strategy: &dyn GeometryStrategy,
) -> Vec<Arc<GisElement>> {
    let area = viewport.to_polygon();
    let bbox = viewport.bounding_box();
    elements
        .iter()
        .filter(|el| el.bounds.is_some_and(|b| b.intersects(&bbox)))
        .filter(|el| strategy.intersects(&el.display_geometry, &area))
        .cloned()
        .collect()
}

/// Degrees covered by the tap tolerance at `zoom`
/// (web-mercator tiles are 256 px wide at zoom 0).
pub(crate) fn hit_tolerance(zoom: f64) -> f64 {
    let degrees_per_px = 360.0 / (256.0 * 2f64.powf(zoom.max(0.0)));
    HIT_TOLERANCE_PX * degrees_per_px
}

/// Elements of `elements` within tap tolerance of `point`. Callers pass
/// the visible set, which already excludes hidden elements.
pub(crate) fn hit_test(
    elements: &[Arc<GisElement>],
    point: LatLng,
    zoom: f64,
    strategy: &dyn GeometryStrategy,
) -> Vec<Arc<GisElement>> {
    let tol = hit_tolerance(zoom);
    let tap_box = BoundingBox {
        south: point.latitude,
        west: point.longitude,
        north: point.latitude,
        east: point.longitude,
    }
    .expand(tol);
    let area = ViewportBounds::from_corners(
        LatLng::new(tap_box.north, tap_box.east),
        LatLng::new(tap_box.south, tap_box.west),
        zoom,
    )
    .to_polygon();
    elements
        .iter()
        .filter(|el| el.bounds.is_some_and(|b| b.intersects(&tap_box)))
        .filter(|el| strategy.intersects(&el.display_geometry, &area))
        .cloned()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{ElementId, FeatureType, LayerKey, LngLat, Shape};

    fn point(id: u64, lat: f64, lng: f64) -> Arc<GisElement> {
        Arc::new(GisElement::new(
            ElementId::new(id),
            LayerKey::from("p_dp"),
            Shape::Point(LngLat::new(lng, lat)),
        ))
    }

    fn viewport() -> ViewportBounds {
        ViewportBounds::from_corners(LatLng::new(1.0, 1.0), LatLng::new(0.0, 0.0), 10.0)
    }

    #[test]
    fn keeps_only_elements_in_view() {
        let els = vec![point(1, 0.5, 0.5), point(2, 3.0, 3.0), point(3, 0.9, 0.1)];
        let out = filter_to_viewport(&els, &viewport(), FeatureType::Point.strategy());
        let ids: Vec<u64> = out.iter().map(|e| e.id.get()).collect();
        assert_eq!(ids, [1, 3]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let els: Vec<_> = (0..50u32)
            .map(|i| point(u64::from(i), f64::from(i) * 0.05, 0.5))
            .collect();
        let s = FeatureType::Point.strategy();
        let once = filter_to_viewport(&els, &viewport(), s);
        let again = filter_to_viewport(&els, &viewport(), s);
        let ids = |v: &[Arc<GisElement>]| v.iter().map(|e| e.id).collect::<Vec<_>>();
        assert_eq!(ids(&once), ids(&again));
        assert_eq!(ids(&filter_to_viewport(&once, &viewport(), s)), ids(&once));
    }

    #[test]
    fn tolerance_shrinks_with_zoom() {
        assert!(hit_tolerance(18.0) < hit_tolerance(10.0));
        assert!(hit_tolerance(-3.0) == hit_tolerance(0.0));
    }

    #[test]
    fn hit_test_finds_nearby_point() {
        let els = vec![point(1, 12.0, 77.0), point(2, 12.5, 77.5)];
        let hits = hit_test(
            &els,
            LatLng::new(12.000_01, 77.000_01),
            16.0,
            FeatureType::Point.strategy(),
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.get(), 1);
    }
}
