// ── Geometry validation gateway ──
//
// Wraps the remote validator. Builds the request from a drawn geometry and
// the session scope, and turns the answer into either the topology needed
// to resolve identifiers or a typed rejection. Offending rings are written
// onto the interaction state; the interaction itself is left alone.

use netgis_api::models::ValidateGeometryRequest;
use netgis_api::{GisClient, ValidationResponse};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::interaction::InteractionState;
use crate::model::{DisplayGeometry, ElementId, ElementRef, LatLng, LayerKey, LngLat};

/// What the validator checks a geometry against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationScope {
    /// Work orders of a ticket.
    Ticket(u64),
    /// Selected regions.
    Regions(Vec<u64>),
}

/// Topology the validator reports for a legal geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validated {
    pub parents: Vec<ElementRef>,
    pub children: Vec<ElementRef>,
    /// Containing regions, outermost first.
    pub region_chain: Vec<ElementRef>,
    pub soft_errors: Vec<String>,
}

/// Interpreted validator answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid(Validated),
    /// Rings (display coordinates) the geometry collides with.
    Intersects(Vec<Vec<LatLng>>),
    /// Geometry leaves its required boundary.
    OutsideBoundary(String),
}

pub fn build_request(
    layer: &LayerKey,
    element_id: Option<ElementId>,
    geometry: &DisplayGeometry,
    scope: &ValidationScope,
) -> ValidateGeometryRequest {
    let (ticket_id, region_id_list) = match scope {
        ValidationScope::Ticket(id) => (Some(*id), None),
        ValidationScope::Regions(ids) => (None, Some(ids.clone())),
    };
    ValidateGeometryRequest {
        layer_key: layer.to_string(),
        element_id: element_id.map(ElementId::get),
        feature_type: geometry.feature_type().to_string(),
        geometry: geometry.to_server().to_raw(),
        ticket_id,
        region_id_list,
    }
}

impl From<ValidationResponse> for ValidationOutcome {
    fn from(response: ValidationResponse) -> Self {
        match response {
            ValidationResponse::Success(ok) => Self::Valid(Validated {
                parents: ok.parents.into_iter().map(ElementRef::from).collect(),
                children: ok.children.into_iter().map(ElementRef::from).collect(),
                region_chain: ok.region_list.into_iter().map(ElementRef::from).collect(),
                soft_errors: ok.soft_errors,
            }),
            ValidationResponse::Intersects(rings) => Self::Intersects(
                rings
                    .into_iter()
                    .map(|ring| {
                        ring.into_iter()
                            .map(|c| LatLng::from(LngLat(c)))
                            .collect()
                    })
                    .collect(),
            ),
            ValidationResponse::Contains(message) => Self::OutsideBoundary(message),
        }
    }
}

/// Send a validation request.
///
/// Authentication failures pass through; every other transport or server
/// failure becomes [`CoreError::ValidationUnavailable`].
pub async fn validate(
    client: &GisClient,
    request: &ValidateGeometryRequest,
) -> Result<ValidationOutcome, CoreError> {
    match client.validate_geometry(request).await {
        Ok(response) => Ok(response.into()),
        Err(e @ netgis_api::Error::Authentication { .. }) => Err(e.into()),
        Err(e) => {
            warn!(layer = %request.layer_key, error = %e, "geometry validation unavailable");
            Err(CoreError::ValidationUnavailable {
                message: e.to_string(),
            })
        }
    }
}

/// Apply an outcome to the interaction state.
///
/// A rejection stores its rings for display and fails; the interaction is
/// not replaced either way.
pub fn apply_outcome(
    state: &mut InteractionState,
    outcome: ValidationOutcome,
) -> Result<Validated, CoreError> {
    match outcome {
        ValidationOutcome::Valid(validated) => {
            debug!(
                parents = validated.parents.len(),
                children = validated.children.len(),
                "geometry accepted"
            );
            Ok(validated)
        }
        ValidationOutcome::Intersects(rings) => {
            let n = rings.len();
            state.set_error_polygons(rings);
            Err(CoreError::GeometryRejected { rings: n })
        }
        ValidationOutcome::OutsideBoundary(message) => Err(CoreError::OutsideBoundary { message }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::interaction::Interaction;
    use crate::model::Shape;
    use netgis_api::RawCoordinates;
    use netgis_api::models::{RegionRef, TopologyNode, ValidationSuccess};

    fn line() -> DisplayGeometry {
        Shape::Polyline(vec![LatLng::new(12.0, 77.0), LatLng::new(12.1, 77.1)])
    }

    #[test]
    fn request_uses_ticket_when_linked() {
        let req = build_request(
            &"p_cable".into(),
            Some(ElementId::new(5)),
            &line(),
            &ValidationScope::Ticket(9),
        );
        assert_eq!(req.ticket_id, Some(9));
        assert!(req.region_id_list.is_none());
        assert_eq!(req.element_id, Some(5));
        assert_eq!(req.feature_type, "Polyline");
        assert_eq!(
            req.geometry,
            RawCoordinates::Path(vec![[77.0, 12.0], [77.1, 12.1]])
        );
    }

    #[test]
    fn request_uses_regions_otherwise() {
        let req = build_request(
            &"p_cable".into(),
            None,
            &line(),
            &ValidationScope::Regions(vec![1, 2]),
        );
        assert!(req.ticket_id.is_none());
        assert_eq!(req.region_id_list, Some(vec![1, 2]));
        let body = serde_json::to_value(&req).unwrap();
        assert!(body.get("element_id").is_none());
    }

    #[test]
    fn success_maps_topology() {
        let resp = ValidationResponse::Success(ValidationSuccess {
            parents: vec![TopologyNode {
                id: 3,
                layer_key: "p_dp".into(),
                unique_id: Some("DP1A2B3C".into()),
                network_id: Some("RN1-DP1A2B3C".into()),
                name: None,
                extra: serde_json::Map::new(),
            }],
            children: Vec::new(),
            region_list: vec![RegionRef {
                id: 1,
                name: "North".into(),
                unique_id: "RN1".into(),
                layer: None,
            }],
            soft_errors: vec!["close to boundary".into()],
        });
        let ValidationOutcome::Valid(v) = ValidationOutcome::from(resp) else {
            panic!("expected valid");
        };
        assert_eq!(v.parents[0].network_id.as_deref(), Some("RN1-DP1A2B3C"));
        assert_eq!(v.region_chain[0].layer_key.as_str(), "region");
        assert_eq!(v.soft_errors.len(), 1);
    }

    #[test]
    fn intersects_stores_display_rings_and_keeps_interaction() {
        let mut state = InteractionState::default();
        state.replace(Interaction::SelectElementsOnMapClick);
        let before = state.interaction.clone();
        let outcome = ValidationOutcome::from(ValidationResponse::Intersects(vec![
            vec![[77.0, 12.0], [77.1, 12.0], [77.1, 12.1]],
            vec![[78.0, 13.0], [78.1, 13.0], [78.1, 13.1]],
        ]));
        let err = apply_outcome(&mut state, outcome).unwrap_err();
        assert!(matches!(err, CoreError::GeometryRejected { rings: 2 }));
        assert_eq!(state.error_polygons.len(), 2);
        assert_eq!(state.error_polygons[0][0], LatLng::new(12.0, 77.0));
        assert_eq!(state.interaction, before);
    }

    #[test]
    fn contains_is_outside_boundary() {
        let mut state = InteractionState::default();
        let err = apply_outcome(
            &mut state,
            ValidationOutcome::OutsideBoundary("outside survey area".into()),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::OutsideBoundary { ref message } if message == "outside survey area"));
        assert!(state.error_polygons.is_empty());
    }
}
