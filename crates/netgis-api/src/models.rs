// GIS service wire types
//
// Payloads as the service sends them. Fields use `#[serde(default)]`
// liberally because element payloads differ per layer; anything not
// modelled explicitly lands in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Geometry ─────────────────────────────────────────────────────────

/// Canonical server coordinates: `[longitude, latitude]` pairs, nested
/// once for lines/rings and twice for ring lists.
///
/// Points are a bare pair, polylines and polygons a flat vertex list (a
/// polygon is its outer ring), multipolygons a list of rings. The nesting
/// depth alone cannot tell a polyline from a polygon, so callers pair this
/// with the layer's feature type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCoordinates {
    Point([f64; 2]),
    Path(Vec<[f64; 2]>),
    Rings(Vec<Vec<[f64; 2]>>),
}

// ── Layer configuration ──────────────────────────────────────────────

/// Per-layer permissions and settings from `GET /api/gis-layer/configs/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub layer_key: String,
    pub name: String,
    #[serde(default)]
    pub can_add: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub is_configurable: bool,
    #[serde(default)]
    pub configuration: Vec<Value>,
}

// ── Regions ──────────────────────────────────────────────────────────

/// A region as returned by the region list endpoints.
///
/// `coordinates` is only present in `detail` mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSummary {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub parent: Option<u64>,
    #[serde(default)]
    pub layer: Option<String>,
    #[serde(default)]
    pub coordinates: Option<RawCoordinates>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Full region record from `GET /api/region/{id}/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionDetails {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub parent: Option<u64>,
    #[serde(default)]
    pub coordinates: Option<RawCoordinates>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Lightweight region reference used in topology chains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRef {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub unique_id: String,
    #[serde(default)]
    pub layer: Option<String>,
}

// ── Elements ─────────────────────────────────────────────────────────

/// One element of a layer as served by `layerData` and element CRUD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawElement {
    pub id: u64,
    #[serde(default)]
    pub layer_key: Option<String>,
    pub coordinates: RawCoordinates,
    #[serde(default)]
    pub center: Option<[f64; 2]>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Layer-specific attributes (home-pass counts, cable types, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /api/gis-layer/data/`.
#[derive(Debug, Clone, Serialize)]
pub struct LayerDataRequest<'a> {
    pub regions: &'a [u64],
    pub layer_key: &'a str,
}

/// A related element in a topology answer (parents / children).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub id: u64,
    pub layer_key: String,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `GET /api/gis-layer/{layer}/{id}/associations/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssociationsResponse {
    #[serde(default)]
    pub parents: Vec<TopologyNode>,
    #[serde(default)]
    pub children: Vec<TopologyNode>,
}

/// Which side of the relation the target element sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationSide {
    Parent,
    Child,
}

/// Body of `POST /api/gis-layer/{layer}/{id}/associations/`.
#[derive(Debug, Clone, Serialize)]
pub struct AddAssociationRequest {
    pub layer_key: String,
    pub element_id: u64,
    pub side: AssociationSide,
}

/// One connection of an element (e.g. a cable spliced into a splitter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: u64,
    pub layer_key: String,
    pub element_id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub port: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /api/gis-layer/{layer}/{id}/connections/`.
#[derive(Debug, Clone, Serialize)]
pub struct AddConnectionRequest {
    pub layer_key: String,
    pub element_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

// ── Validation ───────────────────────────────────────────────────────

/// Body of `POST /api/gis-layer/validate-geometry/`.
///
/// Exactly one of `ticket_id` / `region_id_list` is sent.
#[derive(Debug, Clone, Serialize)]
pub struct ValidateGeometryRequest {
    pub layer_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<u64>,
    pub feature_type: String,
    pub geometry: RawCoordinates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id_list: Option<Vec<u64>>,
}

/// Topology returned when the geometry is legal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSuccess {
    #[serde(default)]
    pub parents: Vec<TopologyNode>,
    #[serde(default)]
    pub children: Vec<TopologyNode>,
    #[serde(default)]
    pub region_list: Vec<RegionRef>,
    #[serde(default)]
    pub soft_errors: Vec<String>,
}

/// Error body of a rejected validation (HTTP 400/409/422).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ValidationErrorBody {
    pub error_type: String,
    #[serde(default)]
    pub data: Option<Vec<Vec<[f64; 2]>>>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Interpreted answer of the geometry validator.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResponse {
    Success(ValidationSuccess),
    /// Offending rings in server coordinates.
    Intersects(Vec<Vec<[f64; 2]>>),
    /// Geometry falls outside its required containing boundary.
    Contains(String),
}

// ── Form errors ──────────────────────────────────────────────────────

/// A single per-field message from a rejected add/edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Deserialize)]
struct FieldErrorList {
    errors: Vec<FieldError>,
}

impl FieldError {
    /// Parse a 400 body into field errors.
    ///
    /// Accepts `{"errors": [{"field", "message"}]}` as well as the
    /// `{"field": ["message", ...]}` map form. Returns an empty vec when
    /// the body matches neither.
    pub fn parse_body(body: &str) -> Vec<Self> {
        if let Ok(list) = serde_json::from_str::<FieldErrorList>(body) {
            return list.errors;
        }
        let Ok(map) = serde_json::from_str::<Map<String, Value>>(body) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (field, value) in map {
            match value {
                Value::Array(items) => {
                    out.extend(items.into_iter().filter_map(|item| match item {
                        Value::String(message) => Some(Self {
                            field: field.clone(),
                            message,
                        }),
                        _ => None,
                    }));
                }
                Value::String(message) if field != "detail" => out.push(Self {
                    field: field.clone(),
                    message,
                }),
                _ => {}
            }
        }
        out
    }
}

// ── Tickets ──────────────────────────────────────────────────────────

/// Boundary the work orders of a ticket are confined to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaPocket {
    #[serde(default)]
    pub id: Option<u64>,
    pub coordinates: RawCoordinates,
}

/// One work order: an element of some layer plus its work status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub layer_key: String,
    pub element: RawElement,
    #[serde(default)]
    pub status: Option<String>,
}

/// `GET /api/ticket/{id}/work-orders/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketWorkOrders {
    #[serde(default)]
    pub area_pocket: Option<AreaPocket>,
    #[serde(default)]
    pub work_orders: Vec<WorkOrder>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_coordinates_depths() {
        let p: RawCoordinates = serde_json::from_value(json!([77.5, 12.9])).unwrap();
        assert_eq!(p, RawCoordinates::Point([77.5, 12.9]));

        let l: RawCoordinates = serde_json::from_value(json!([[1.0, 2.0], [3.0, 4.0]])).unwrap();
        assert_eq!(l, RawCoordinates::Path(vec![[1.0, 2.0], [3.0, 4.0]]));

        let r: RawCoordinates =
            serde_json::from_value(json!([[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]])).unwrap();
        assert!(matches!(r, RawCoordinates::Rings(ref rings) if rings[0].len() == 3));
    }

    #[test]
    fn raw_element_keeps_unknown_fields() {
        let el: RawElement = serde_json::from_value(json!({
            "id": 7,
            "coordinates": [77.5, 12.9],
            "status": "RFS",
            "home_pass": 12
        }))
        .unwrap();
        assert_eq!(el.id, 7);
        assert_eq!(el.extra.get("home_pass"), Some(&json!(12)));
        assert!(el.unique_id.is_none());
    }

    #[test]
    fn field_errors_from_list_form() {
        let body = r#"{"errors":[{"field":"name","message":"required"}]}"#;
        let errs = FieldError::parse_body(body);
        assert_eq!(
            errs,
            vec![FieldError {
                field: "name".into(),
                message: "required".into()
            }]
        );
    }

    #[test]
    fn field_errors_from_map_form() {
        let body = r#"{"name":["This field is required."],"detail":"Bad request"}"#;
        let errs = FieldError::parse_body(body);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, "name");
    }

    #[test]
    fn field_errors_from_garbage_is_empty() {
        assert!(FieldError::parse_body("<html>").is_empty());
    }

    #[test]
    fn validate_request_omits_absent_scope() {
        let req = ValidateGeometryRequest {
            layer_key: "p_dp".into(),
            element_id: None,
            feature_type: "Point".into(),
            geometry: RawCoordinates::Point([1.0, 2.0]),
            ticket_id: Some(9),
            region_id_list: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["ticket_id"], json!(9));
        assert!(v.get("region_id_list").is_none());
        assert!(v.get("element_id").is_none());
    }
}
