// ── Map interaction state machine ──
//
// Exactly one workflow owns the map surface at a time. Each variant of
// `Interaction` carries its own payload; issuing a new interaction
// replaces the current one outright and bumps the generation token, which
// in-flight requests use to detect that their interaction is gone.

use serde::Serialize;
use serde_json::{Map, Value};
use strum::IntoStaticStr;

use crate::error::CoreError;
use crate::model::{
    Association, DisplayGeometry, ElementId, ElementRef, GisElement, LatLng, LayerKey,
};
use crate::registry::{FormFieldError, LayerRegistry};

/// Form data being filled plus the errors from the last attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormPayload {
    pub data: Map<String, Value>,
    pub errors: Vec<FormFieldError>,
}

impl FormPayload {
    pub fn seeded(data: Map<String, Value>) -> Self {
        Self {
            data,
            errors: Vec::new(),
        }
    }
}

/// The workflow currently owning the map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, IntoStaticStr)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Interaction {
    #[default]
    Idle,
    SelectAddLayer {
        layers: Vec<LayerKey>,
    },
    AddElementGeometry {
        layer: LayerKey,
        vertices: Vec<LatLng>,
    },
    AddElementForm {
        layer: LayerKey,
        geometry: DisplayGeometry,
        form: FormPayload,
    },
    ShowElementDetails {
        layer: LayerKey,
        id: ElementId,
    },
    EditElementGeometry {
        layer: LayerKey,
        id: ElementId,
        unique_id: Option<String>,
        /// Geometry before the edit; parts not being redrawn come from here.
        original: DisplayGeometry,
        vertices: Vec<LatLng>,
        data: Map<String, Value>,
    },
    EditElementForm {
        layer: LayerKey,
        id: ElementId,
        unique_id: Option<String>,
        geometry: DisplayGeometry,
        geometry_changed: bool,
        form: FormPayload,
    },
    SelectElementsOnMapClick,
    ListElementsOnMap {
        point: LatLng,
        candidates: Vec<(LayerKey, ElementId)>,
    },
    ShowAssociatedElements {
        layer: LayerKey,
        id: ElementId,
        association: Association,
    },
    ShowPossibleAddAssociation {
        layer: LayerKey,
        id: ElementId,
        target_layer: LayerKey,
        candidates: Vec<ElementId>,
    },
    AddElementConnection {
        layer: LayerKey,
        id: ElementId,
        target_layer: LayerKey,
        candidates: Vec<ElementId>,
    },
    ShowElementConnections {
        layer: LayerKey,
        id: ElementId,
        connections: Vec<ElementRef>,
    },
    ShowRegionDetails {
        region_id: u64,
    },
    ShowTicketWorkOrders {
        ticket_id: u64,
        work_orders: Vec<(LayerKey, ElementId)>,
    },
    ShowElementOnMap {
        layer: LayerKey,
        id: ElementId,
    },
}

impl Interaction {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Element whose stored geometry is superseded by a draft and must be
    /// hidden from the map meanwhile.
    pub fn hidden_element(&self) -> Option<(&LayerKey, ElementId)> {
        match self {
            Self::EditElementGeometry { layer, id, .. }
            | Self::EditElementForm {
                layer,
                id,
                geometry_changed: true,
                ..
            } => Some((layer, *id)),
            _ => None,
        }
    }
}

/// Ticket whose work orders scope the current session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketLink {
    pub ticket_id: u64,
    pub area_pocket: Option<DisplayGeometry>,
}

/// Everything a form submit needs from the interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub layer: LayerKey,
    /// `None` for a new element.
    pub element_id: Option<ElementId>,
    /// Unique id the edited element already carries.
    pub unique_id: Option<String>,
    pub geometry: DisplayGeometry,
    pub data: Map<String, Value>,
    pub generation: u64,
}

/// The single live interaction plus its overlays.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InteractionState {
    pub interaction: Interaction,
    /// Offending rings from the last rejected validation, for red overlay.
    pub error_polygons: Vec<Vec<LatLng>>,
    pub ticket: Option<TicketLink>,
    generation: u64,
}

impl InteractionState {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.interaction, Interaction::Idle)
    }

    /// Unconditionally replace the current interaction.
    pub fn replace(&mut self, next: Interaction) {
        self.interaction = next;
        self.error_polygons.clear();
        self.generation += 1;
    }

    /// Back to `Idle`. The ticket link is scope, not workflow, and stays.
    pub fn cancel(&mut self) {
        self.replace(Interaction::Idle);
    }

    pub fn set_ticket(&mut self, ticket: Option<TicketLink>) {
        self.ticket = ticket;
    }

    // ── Geometry drawing ─────────────────────────────────────────────

    /// Start drawing a new element.
    pub fn start_add(&mut self, registry: &LayerRegistry, layer: LayerKey) -> Result<(), CoreError> {
        registry.describe(&layer)?;
        self.replace(Interaction::AddElementGeometry {
            layer,
            vertices: Vec::new(),
        });
        Ok(())
    }

    /// Feed a map tap into the geometry being drawn.
    pub fn tap(&mut self, registry: &LayerRegistry, point: LatLng) -> Result<(), CoreError> {
        let name = self.interaction.name();
        match &mut self.interaction {
            Interaction::AddElementGeometry { layer, vertices }
            | Interaction::EditElementGeometry {
                layer, vertices, ..
            } => {
                let strategy = registry.describe(&*layer)?.strategy();
                *vertices = strategy.accumulate(vertices, point);
                Ok(())
            }
            _ => Err(invalid("add a vertex", name)),
        }
    }

    pub fn undo_last_vertex(&mut self) -> Result<(), CoreError> {
        let name = self.interaction.name();
        match &mut self.interaction {
            Interaction::AddElementGeometry { vertices, .. }
            | Interaction::EditElementGeometry { vertices, .. } => {
                vertices.pop();
                Ok(())
            }
            _ => Err(invalid("undo a vertex", name)),
        }
    }

    /// Finish drawing and move on to the form.
    pub fn confirm_geometry(&mut self, registry: &LayerRegistry) -> Result<(), CoreError> {
        let next = match &self.interaction {
            Interaction::AddElementGeometry { layer, vertices } => {
                let geometry = registry.describe(layer)?.strategy().build(vertices)?;
                Interaction::AddElementForm {
                    layer: layer.clone(),
                    geometry,
                    form: FormPayload::default(),
                }
            }
            Interaction::EditElementGeometry {
                layer,
                id,
                unique_id,
                original,
                vertices,
                data,
            } => {
                let geometry = registry
                    .describe(layer)?
                    .strategy()
                    .rebuild(original, vertices)?;
                Interaction::EditElementForm {
                    layer: layer.clone(),
                    id: *id,
                    unique_id: unique_id.clone(),
                    geometry,
                    geometry_changed: true,
                    form: FormPayload::seeded(data.clone()),
                }
            }
            other => return Err(invalid("confirm geometry", other.name())),
        };
        self.replace(next);
        Ok(())
    }

    // ── Element details ──────────────────────────────────────────────

    /// `ShowElementDetails` → redraw the element's geometry.
    pub fn edit_location(
        &mut self,
        registry: &LayerRegistry,
        element: &GisElement,
    ) -> Result<(), CoreError> {
        self.expect_details_of(element, "edit location")?;
        let vertices = registry
            .describe(&element.layer_key)?
            .strategy()
            .seed(&element.display_geometry);
        self.replace(Interaction::EditElementGeometry {
            layer: element.layer_key.clone(),
            id: element.id,
            unique_id: element.unique_id.clone(),
            original: element.display_geometry.clone(),
            vertices,
            data: form_seed(element),
        });
        Ok(())
    }

    /// `ShowElementDetails` → edit the element's attributes.
    pub fn edit_details(&mut self, element: &GisElement) -> Result<(), CoreError> {
        self.expect_details_of(element, "edit details")?;
        self.replace(Interaction::EditElementForm {
            layer: element.layer_key.clone(),
            id: element.id,
            unique_id: element.unique_id.clone(),
            geometry: element.display_geometry.clone(),
            geometry_changed: false,
            form: FormPayload::seeded(form_seed(element)),
        });
        Ok(())
    }

    fn expect_details_of(&self, element: &GisElement, action: &str) -> Result<(), CoreError> {
        match &self.interaction {
            Interaction::ShowElementDetails { layer, id }
                if *layer == element.layer_key && *id == element.id =>
            {
                Ok(())
            }
            other => Err(invalid(action, other.name())),
        }
    }

    // ── Forms ────────────────────────────────────────────────────────

    pub fn set_field(&mut self, name: &str, value: Value) -> Result<(), CoreError> {
        let form = self.form_mut("set a field")?;
        form.errors.retain(|e| e.field != name);
        form.data.insert(name.to_owned(), value);
        Ok(())
    }

    /// Attach per-field errors to the form; the interaction stays.
    pub fn attach_errors(&mut self, errors: Vec<FormFieldError>) -> Result<(), CoreError> {
        self.form_mut("attach form errors")?.errors = errors;
        Ok(())
    }

    pub fn form(&self) -> Option<&FormPayload> {
        match &self.interaction {
            Interaction::AddElementForm { form, .. } | Interaction::EditElementForm { form, .. } => {
                Some(form)
            }
            _ => None,
        }
    }

    fn form_mut(&mut self, action: &str) -> Result<&mut FormPayload, CoreError> {
        let name = self.interaction.name();
        match &mut self.interaction {
            Interaction::AddElementForm { form, .. } | Interaction::EditElementForm { form, .. } => {
                Ok(form)
            }
            _ => Err(invalid(action, name)),
        }
    }

    /// The pending add/edit, if the interaction is a form.
    pub fn submission(&self) -> Result<Submission, CoreError> {
        match &self.interaction {
            Interaction::AddElementForm {
                layer,
                geometry,
                form,
            } => Ok(Submission {
                layer: layer.clone(),
                element_id: None,
                unique_id: None,
                geometry: geometry.clone(),
                data: form.data.clone(),
                generation: self.generation,
            }),
            Interaction::EditElementForm {
                layer,
                id,
                unique_id,
                geometry,
                form,
                ..
            } => Ok(Submission {
                layer: layer.clone(),
                element_id: Some(*id),
                unique_id: unique_id.clone(),
                geometry: geometry.clone(),
                data: form.data.clone(),
                generation: self.generation,
            }),
            other => Err(invalid("submit", other.name())),
        }
    }

    // ── Validation overlays ──────────────────────────────────────────

    pub fn clear_error_polygons(&mut self) {
        self.error_polygons.clear();
    }

    pub fn set_error_polygons(&mut self, rings: Vec<Vec<LatLng>>) {
        self.error_polygons = rings;
    }
}

/// Editable attributes of an element as initial form data.
fn form_seed(element: &GisElement) -> Map<String, Value> {
    let mut data = element.attributes.clone();
    if let Some(name) = &element.name {
        data.insert("name".into(), Value::String(name.clone()));
    }
    if !element.status.code().is_empty() {
        data.insert("status".into(), Value::String(element.status.code().into()));
    }
    data
}

fn invalid(action: &str, state: &str) -> CoreError {
    CoreError::InvalidTransition {
        action: action.to_owned(),
        state: state.to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{LngLat, Shape};
    use serde_json::json;

    fn reg() -> LayerRegistry {
        LayerRegistry::builtin()
    }

    fn p(lat: f64, lng: f64) -> LatLng {
        LatLng::new(lat, lng)
    }

    #[test]
    fn replacing_bumps_generation_and_clears_overlays() {
        let mut s = InteractionState::default();
        s.set_error_polygons(vec![vec![p(0.0, 0.0)]]);
        let g = s.generation();
        s.replace(Interaction::SelectElementsOnMapClick);
        assert_eq!(s.generation(), g + 1);
        assert!(s.error_polygons.is_empty());
    }

    #[test]
    fn polyline_add_flow() {
        let r = reg();
        let mut s = InteractionState::default();
        s.start_add(&r, "p_cable".into()).unwrap();
        s.tap(&r, p(1.0, 1.0)).unwrap();
        assert!(matches!(
            s.confirm_geometry(&r),
            Err(CoreError::IncompleteGeometry { required: 2, actual: 1, .. })
        ));
        s.tap(&r, p(2.0, 2.0)).unwrap();
        s.confirm_geometry(&r).unwrap();
        match &s.interaction {
            Interaction::AddElementForm { geometry, .. } => {
                assert_eq!(geometry, &Shape::Polyline(vec![p(1.0, 1.0), p(2.0, 2.0)]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn point_tap_replaces_vertex() {
        let r = reg();
        let mut s = InteractionState::default();
        s.start_add(&r, "p_dp".into()).unwrap();
        s.tap(&r, p(1.0, 1.0)).unwrap();
        s.tap(&r, p(2.0, 2.0)).unwrap();
        s.confirm_geometry(&r).unwrap();
        let sub = s.submission().unwrap();
        assert_eq!(sub.geometry, Shape::Point(p(2.0, 2.0)));
        assert!(sub.element_id.is_none());
    }

    #[test]
    fn undo_removes_last_vertex() {
        let r = reg();
        let mut s = InteractionState::default();
        s.start_add(&r, "survey_area".into()).unwrap();
        for i in 0..3 {
            s.tap(&r, p(f64::from(i), 0.0)).unwrap();
        }
        s.undo_last_vertex().unwrap();
        assert!(s.confirm_geometry(&r).is_err());
    }

    #[test]
    fn tap_outside_drawing_is_invalid() {
        let r = reg();
        let mut s = InteractionState::default();
        assert!(matches!(
            s.tap(&r, p(0.0, 0.0)),
            Err(CoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn details_to_edit_location_seeds_vertices() {
        let r = reg();
        let mut el = GisElement::new(
            ElementId::new(9),
            "p_cable".into(),
            Shape::Polyline(vec![LngLat::new(77.0, 12.0), LngLat::new(77.1, 12.1)]),
        );
        el.name = Some("Feeder".into());
        let mut s = InteractionState::default();
        s.replace(Interaction::ShowElementDetails {
            layer: "p_cable".into(),
            id: ElementId::new(9),
        });
        s.edit_location(&r, &el).unwrap();
        match &s.interaction {
            Interaction::EditElementGeometry { vertices, data, .. } => {
                assert_eq!(vertices.len(), 2);
                assert_eq!(data.get("name"), Some(&json!("Feeder")));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            s.interaction.hidden_element(),
            Some((&LayerKey::from("p_cable"), ElementId::new(9)))
        );
        s.tap(&r, p(12.2, 77.2)).unwrap();
        s.confirm_geometry(&r).unwrap();
        let sub = s.submission().unwrap();
        assert_eq!(sub.element_id, Some(ElementId::new(9)));
        assert_eq!(sub.geometry.vertices().len(), 3);
    }

    #[test]
    fn edit_details_keeps_geometry() {
        let el = GisElement::new(
            ElementId::new(4),
            "p_dp".into(),
            Shape::Point(LngLat::new(77.0, 12.0)),
        );
        let mut s = InteractionState::default();
        s.replace(Interaction::ShowElementDetails {
            layer: "p_dp".into(),
            id: ElementId::new(4),
        });
        s.edit_details(&el).unwrap();
        assert!(s.interaction.hidden_element().is_none());
        assert_eq!(s.submission().unwrap().geometry, el.display_geometry);
    }

    #[test]
    fn untouched_region_edit_keeps_every_part() {
        let r = reg();
        let part = |at: f64| {
            vec![
                LngLat::new(at, at),
                LngLat::new(at + 1.0, at),
                LngLat::new(at + 1.0, at + 1.0),
            ]
        };
        let mut el = GisElement::new(
            ElementId::new(3),
            "region".into(),
            Shape::MultiPolygon(vec![part(77.0), part(80.0)]),
        );
        el.unique_id = Some("RGN0003".into());
        let mut s = InteractionState::default();
        s.replace(Interaction::ShowElementDetails {
            layer: "region".into(),
            id: ElementId::new(3),
        });
        s.edit_location(&r, &el).unwrap();
        s.confirm_geometry(&r).unwrap();

        let sub = s.submission().unwrap();
        assert_eq!(sub.geometry, el.display_geometry);
        match &sub.geometry {
            Shape::MultiPolygon(parts) => assert_eq!(parts.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(sub.unique_id.as_deref(), Some("RGN0003"));
    }

    #[test]
    fn edit_details_carries_unique_id() {
        let mut el = GisElement::new(
            ElementId::new(5),
            "p_dp".into(),
            Shape::Point(LngLat::new(77.0, 12.0)),
        );
        el.unique_id = Some("DPKEEP01".into());
        let mut s = InteractionState::default();
        s.replace(Interaction::ShowElementDetails {
            layer: "p_dp".into(),
            id: ElementId::new(5),
        });
        s.edit_details(&el).unwrap();
        assert_eq!(s.submission().unwrap().unique_id.as_deref(), Some("DPKEEP01"));
    }

    #[test]
    fn edit_requires_details_of_same_element() {
        let el = GisElement::new(
            ElementId::new(4),
            "p_dp".into(),
            Shape::Point(LngLat::new(77.0, 12.0)),
        );
        let mut s = InteractionState::default();
        s.replace(Interaction::ShowElementDetails {
            layer: "p_dp".into(),
            id: ElementId::new(5),
        });
        assert!(s.edit_details(&el).is_err());
    }

    #[test]
    fn field_errors_stay_until_field_changes() {
        let r = reg();
        let mut s = InteractionState::default();
        s.start_add(&r, "p_dp".into()).unwrap();
        s.tap(&r, p(1.0, 1.0)).unwrap();
        s.confirm_geometry(&r).unwrap();
        s.attach_errors(vec![FormFieldError {
            field: "name".into(),
            message: "required".into(),
        }])
        .unwrap();
        assert_eq!(s.form().unwrap().errors.len(), 1);
        s.set_field("name", json!("DP-1")).unwrap();
        assert!(s.form().unwrap().errors.is_empty());
    }

    #[test]
    fn cancel_resets_to_idle_and_keeps_ticket() {
        let r = reg();
        let mut s = InteractionState::default();
        s.set_ticket(Some(TicketLink {
            ticket_id: 7,
            area_pocket: None,
        }));
        s.start_add(&r, "p_dp".into()).unwrap();
        s.cancel();
        assert!(s.is_idle());
        assert_eq!(s.ticket.as_ref().map(|t| t.ticket_id), Some(7));
    }

    #[test]
    fn interaction_serializes_with_event_tag() {
        let v = serde_json::to_value(Interaction::ShowRegionDetails { region_id: 3 }).unwrap();
        assert_eq!(v["event"], json!("show_region_details"));
    }
}
