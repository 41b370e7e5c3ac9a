// ── API-to-domain type conversions ──
//
// Bridges raw `netgis_api` payloads into `netgis_core::model` types.
// Geometry needs the layer's feature type, so element conversion goes
// through the registry descriptor instead of a plain `From` impl.

use netgis_api::models::{Connection, RegionRef, RegionSummary, TopologyNode};
use netgis_api::RawElement;
use serde_json::Value;

use crate::error::CoreError;
use crate::model::{
    ElementId, ElementRef, ElementStatus, GisElement, LatLng, LayerKey, LngLat, ServerGeometry,
};
use crate::registry::LayerDescriptor;

/// Convert one layer-data element.
pub fn element_from_raw(
    descriptor: &LayerDescriptor,
    raw: RawElement,
) -> Result<GisElement, CoreError> {
    let geometry = ServerGeometry::from_raw(&raw.coordinates, descriptor.feature_type)?;
    let mut el = GisElement::new(ElementId::new(raw.id), descriptor.key.clone(), geometry);
    if let Some([lng, lat]) = raw.center {
        el.center = Some(LatLng::from(LngLat::new(lng, lat)));
    }
    el.status = raw
        .status
        .as_deref()
        .map_or(ElementStatus::Unknown, ElementStatus::from_code);
    el.unique_id = raw.unique_id;
    el.network_id = raw.network_id;
    el.name = raw.name;
    el.attributes = raw.extra;
    Ok(el)
}

/// Convert a layer-data batch; elements with unusable geometry are skipped
/// and reported through the returned count.
pub fn elements_from_raw(
    descriptor: &LayerDescriptor,
    raw: Vec<RawElement>,
) -> (Vec<GisElement>, usize) {
    let mut skipped = 0;
    let elements = raw
        .into_iter()
        .filter_map(|r| match element_from_raw(descriptor, r) {
            Ok(el) => Some(el),
            Err(e) => {
                tracing::warn!(layer = %descriptor.key, error = %e, "skipping element");
                skipped += 1;
                None
            }
        })
        .collect();
    (elements, skipped)
}

/// Region boundaries arrive through the region list instead of layer data.
pub fn region_to_raw(region: RegionSummary) -> Option<RawElement> {
    let coordinates = region.coordinates?;
    let mut extra = serde_json::Map::new();
    if let Some(parent) = region.parent {
        extra.insert("parent".into(), Value::from(parent));
    }
    Some(RawElement {
        id: region.id,
        layer_key: Some("region".into()),
        coordinates,
        center: None,
        status: region.status,
        unique_id: region.unique_id,
        network_id: None,
        name: Some(region.name),
        extra,
    })
}

impl From<TopologyNode> for ElementRef {
    fn from(node: TopologyNode) -> Self {
        Self {
            layer_key: LayerKey::from(node.layer_key),
            id: ElementId::new(node.id),
            unique_id: node.unique_id,
            network_id: node.network_id,
            name: node.name,
            attributes: node.extra,
        }
    }
}

impl From<RegionRef> for ElementRef {
    fn from(region: RegionRef) -> Self {
        Self {
            layer_key: region
                .layer
                .map_or_else(|| LayerKey::from("region"), LayerKey::from),
            id: ElementId::new(region.id),
            unique_id: Some(region.unique_id),
            network_id: None,
            name: Some(region.name).filter(|n| !n.is_empty()),
            attributes: serde_json::Map::new(),
        }
    }
}

impl From<Connection> for ElementRef {
    fn from(c: Connection) -> Self {
        let mut attributes = c.extra;
        if let Some(port) = c.port {
            attributes.insert("port".into(), Value::String(port));
        }
        Self {
            layer_key: LayerKey::from(c.layer_key),
            id: ElementId::new(c.element_id),
            unique_id: None,
            network_id: None,
            name: c.name,
            attributes,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{FeatureType, Shape};
    use crate::registry::LayerRegistry;
    use serde_json::json;

    fn raw(v: Value) -> RawElement {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn converts_point_element() {
        let reg = LayerRegistry::builtin();
        let d = reg.describe("p_dp").unwrap();
        let el = element_from_raw(
            d,
            raw(json!({
                "id": 3, "coordinates": [77.5, 12.9], "status": "RFS",
                "network_id": "RN-DPAAAAAA", "capacity": 8
            })),
        )
        .unwrap();
        assert_eq!(el.display_geometry, Shape::Point(LatLng::new(12.9, 77.5)));
        assert_eq!(el.status, ElementStatus::ReadyForService);
        assert_eq!(el.attributes.get("capacity"), Some(&json!(8)));
        assert_eq!(el.layer_key.as_str(), "p_dp");
    }

    #[test]
    fn explicit_center_wins() {
        let reg = LayerRegistry::builtin();
        let d = reg.describe("p_sa").unwrap();
        let el = element_from_raw(
            d,
            raw(json!({
                "id": 3, "coordinates": [[0.0, 0.0], [0.0, 2.0], [2.0, 2.0]],
                "center": [5.0, 6.0]
            })),
        )
        .unwrap();
        assert_eq!(el.center, Some(LatLng::new(6.0, 5.0)));
        assert_eq!(el.display_geometry.feature_type(), FeatureType::Polygon);
    }

    #[test]
    fn batch_skips_mismatched_geometry() {
        let reg = LayerRegistry::builtin();
        let d = reg.describe("p_cable").unwrap();
        let (els, skipped) = elements_from_raw(
            d,
            vec![
                raw(json!({"id": 1, "coordinates": [[0.0, 0.0], [1.0, 1.0]]})),
                raw(json!({"id": 2, "coordinates": [0.0, 0.0]})),
            ],
        );
        assert_eq!(els.len(), 1);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn region_without_boundary_is_dropped() {
        let summary: RegionSummary =
            serde_json::from_value(json!({"id": 1, "name": "North"})).unwrap();
        assert!(region_to_raw(summary).is_none());
    }
}
