// ── Element domain types ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumIter};

use super::geometry::{BoundingBox, DisplayGeometry, LatLng, ServerGeometry};
use super::ids::{ElementId, LayerKey};

/// Work status of a network asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum ElementStatus {
    Planned,
    InProgress,
    ReadyForService,
    Inactive,
    Unknown,
}

impl ElementStatus {
    /// Parse a server status code. Accepts both the short codes the
    /// service stores and their spelled-out names.
    pub fn from_code(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "p" | "planned" => Self::Planned,
            "ip" | "in_progress" | "inprogress" => Self::InProgress,
            "rfs" | "ready_for_service" | "readyforservice" => Self::ReadyForService,
            "ia" | "inactive" => Self::Inactive,
            _ => Self::Unknown,
        }
    }

    /// Short code as sent back to the service.
    pub fn code(self) -> &'static str {
        match self {
            Self::Planned => "P",
            Self::InProgress => "IP",
            Self::ReadyForService => "RFS",
            Self::Inactive => "IA",
            Self::Unknown => "",
        }
    }
}

/// A related element, as reported by the topology endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRef {
    pub layer_key: LayerKey,
    pub id: ElementId,
    pub unique_id: Option<String>,
    pub network_id: Option<String>,
    pub name: Option<String>,
    /// Remaining attributes, used by dependent-field resolvers.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Parents and children of an element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub parents: Vec<ElementRef>,
    pub children: Vec<ElementRef>,
}

/// One asset on the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GisElement {
    pub id: ElementId,
    pub layer_key: LayerKey,
    pub server_geometry: ServerGeometry,
    pub display_geometry: DisplayGeometry,
    pub center: Option<LatLng>,
    pub bounds: Option<BoundingBox>,
    pub status: ElementStatus,
    /// Hidden while the element is being re-drawn.
    pub hidden: bool,
    pub highlighted: bool,
    pub association: Association,
    pub unique_id: Option<String>,
    pub network_id: Option<String>,
    pub name: Option<String>,
    pub attributes: Map<String, Value>,
}

impl GisElement {
    /// Build an element from server geometry, deriving display geometry,
    /// bounds and (absent an explicit one) center.
    pub fn new(id: ElementId, layer_key: LayerKey, server_geometry: ServerGeometry) -> Self {
        let display_geometry = server_geometry.to_display();
        let bounds = display_geometry.bounds();
        let center = display_geometry.center();
        Self {
            id,
            layer_key,
            server_geometry,
            display_geometry,
            center,
            bounds,
            status: ElementStatus::Unknown,
            hidden: false,
            highlighted: false,
            association: Association::default(),
            unique_id: None,
            network_id: None,
            name: None,
            attributes: Map::new(),
        }
    }

    /// Name for listings: the element name, else its network id, else
    /// `layer#id`.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.network_id.clone())
            .unwrap_or_else(|| format!("{}#{}", self.layer_key, self.id))
    }

    /// Numeric attribute, accepting numbers and numeric strings.
    pub fn numeric_attribute(&self, field: &str) -> Option<f64> {
        numeric(self.attributes.get(field)?)
    }
}

impl ElementRef {
    pub fn numeric_attribute(&self, field: &str) -> Option<f64> {
        numeric(self.attributes.get(field)?)
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
