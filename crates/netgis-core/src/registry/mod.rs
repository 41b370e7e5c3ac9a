// ── Layer registry ──
//
// Static description of every asset layer: geometry kind, id prefix,
// style data, form template, and where the layer sits in the topology.
// Built once, shared behind an `Arc`, never mutated afterwards.

mod builtin;
mod dependent;
mod form;
mod strategy;
mod style;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

pub use dependent::{CountChildren, DependentFieldResolver, SumChildField};
pub use form::{FieldKind, FormField, FormFieldError, check_form};
pub use strategy::{
    GeometryStrategy, MultiPolygonStrategy, PointStrategy, PolygonStrategy, PolylineStrategy,
};
pub use style::{ElementStyle, LayerStyle, StyleMode};

use crate::error::CoreError;
use crate::model::{ElementRef, FeatureType, GisElement, LayerKey};

/// Everything the rest of the system needs to know about one layer.
#[derive(Debug, Clone)]
pub struct LayerDescriptor {
    pub key: LayerKey,
    pub name: String,
    pub feature_type: FeatureType,
    /// Prefix of generated unique ids (e.g. `"DP"`).
    pub id_prefix: String,
    pub style: LayerStyle,
    pub form: Vec<FormField>,
    /// Columns shown in element listings.
    pub table_fields: Vec<String>,
    pub dependent_fields: Option<Arc<dyn DependentFieldResolver>>,
    pub parent_layers: Vec<LayerKey>,
    pub child_layers: Vec<LayerKey>,
    /// Whether elements take part in cable connections.
    pub connectable: bool,
}

impl LayerDescriptor {
    pub fn new(key: &str, name: &str, feature_type: FeatureType, id_prefix: &str) -> Self {
        Self {
            key: LayerKey::from(key),
            name: name.into(),
            feature_type,
            id_prefix: id_prefix.into(),
            style: LayerStyle::new("#2563EB"),
            form: vec![FormField::text("name", "Name").required()],
            table_fields: vec!["network_id".into(), "name".into(), "status".into()],
            dependent_fields: None,
            parent_layers: Vec::new(),
            child_layers: Vec::new(),
            connectable: false,
        }
    }

    #[must_use]
    pub fn with_style(mut self, style: LayerStyle) -> Self {
        self.style = style;
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: FormField) -> Self {
        self.form.push(field);
        self
    }

    #[must_use]
    pub fn with_table_fields(mut self, fields: &[&str]) -> Self {
        self.table_fields = fields.iter().map(|f| (*f).to_owned()).collect();
        self
    }

    #[must_use]
    pub fn with_dependent_fields(mut self, resolver: impl DependentFieldResolver + 'static) -> Self {
        self.dependent_fields = Some(Arc::new(resolver));
        self
    }

    #[must_use]
    pub fn with_parents(mut self, parents: &[&str]) -> Self {
        self.parent_layers = parents.iter().map(|p| LayerKey::from(*p)).collect();
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: &[&str]) -> Self {
        self.child_layers = children.iter().map(|c| LayerKey::from(*c)).collect();
        self
    }

    #[must_use]
    pub fn connectable(mut self) -> Self {
        self.connectable = true;
        self
    }

    pub fn strategy(&self) -> &'static dyn GeometryStrategy {
        self.feature_type.strategy()
    }

    /// Derived fields from `children`; empty when the layer has none.
    pub fn resolve_dependent(&self, children: &[ElementRef]) -> Map<String, Value> {
        self.dependent_fields
            .as_ref()
            .map(|r| r.resolve(children))
            .unwrap_or_default()
    }

    /// Whether `other` may be linked to this layer as parent or child.
    pub fn relates_to(&self, other: &LayerKey) -> bool {
        self.parent_layers.contains(other) || self.child_layers.contains(other)
    }
}

/// Immutable lookup table of layer descriptors.
#[derive(Debug, Clone, Default)]
pub struct LayerRegistry {
    layers: Vec<LayerDescriptor>,
    index: HashMap<String, usize>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor, replacing any previous one with the same key.
    #[must_use]
    pub fn with_layer(mut self, descriptor: LayerDescriptor) -> Self {
        let key = descriptor.key.as_str().to_owned();
        if let Some(&i) = self.index.get(&key) {
            self.layers[i] = descriptor;
        } else {
            self.index.insert(key, self.layers.len());
            self.layers.push(descriptor);
        }
        self
    }

    pub fn describe(&self, key: impl AsRef<str>) -> Result<&LayerDescriptor, CoreError> {
        let key = key.as_ref();
        self.index
            .get(key)
            .map(|&i| &self.layers[i])
            .ok_or_else(|| CoreError::UnknownLayer {
                layer: key.to_owned(),
            })
    }

    pub fn contains(&self, key: impl AsRef<str>) -> bool {
        self.index.contains_key(key.as_ref())
    }

    /// Descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &LayerDescriptor> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Style of an element according to its layer.
    pub fn resolve_style(
        &self,
        element: &GisElement,
        mode: StyleMode,
    ) -> Result<ElementStyle, CoreError> {
        Ok(self
            .describe(&element.layer_key)?
            .style
            .resolve(element, mode))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{ElementId, ElementStatus, LngLat, Shape};

    #[test]
    fn builtin_catalog_covers_standard_layers() {
        let reg = LayerRegistry::builtin();
        for key in [
            "region",
            "survey_area",
            "survey_building",
            "p_dp",
            "p_splitter",
            "p_cable",
            "p_pop",
            "p_sa",
        ] {
            assert!(reg.contains(key), "missing {key}");
        }
        assert_eq!(
            reg.describe("region").unwrap().feature_type,
            FeatureType::MultiPolygon
        );
        assert_eq!(
            reg.describe("p_cable").unwrap().feature_type,
            FeatureType::Polyline
        );
        assert_eq!(
            reg.describe("survey_area").unwrap().feature_type,
            FeatureType::Polygon
        );
    }

    #[test]
    fn unknown_layer_is_an_error() {
        let reg = LayerRegistry::builtin();
        assert!(matches!(
            reg.describe("p_nope"),
            Err(CoreError::UnknownLayer { ref layer }) if layer == "p_nope"
        ));
    }

    #[test]
    fn id_prefixes_are_unique() {
        let reg = LayerRegistry::builtin();
        let mut prefixes: Vec<_> = reg.iter().map(|d| d.id_prefix.clone()).collect();
        prefixes.sort();
        let before = prefixes.len();
        prefixes.dedup();
        assert_eq!(before, prefixes.len());
    }

    #[test]
    fn topology_is_symmetric() {
        let reg = LayerRegistry::builtin();
        for d in reg.iter() {
            for child in &d.child_layers {
                let c = reg.describe(child).unwrap();
                assert!(
                    c.parent_layers.contains(&d.key),
                    "{child} does not list {} as parent",
                    d.key
                );
            }
        }
    }

    #[test]
    fn with_layer_replaces_same_key() {
        let reg = LayerRegistry::new()
            .with_layer(LayerDescriptor::new("x", "X", FeatureType::Point, "X"))
            .with_layer(LayerDescriptor::new("x", "X2", FeatureType::Polygon, "X"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.describe("x").unwrap().name, "X2");
    }

    #[test]
    fn style_prefers_highlight_then_status() {
        let reg = LayerRegistry::builtin();
        let mut el = GisElement::new(
            ElementId::new(1),
            LayerKey::from("p_cable"),
            Shape::Polyline(vec![LngLat::new(0.0, 0.0), LngLat::new(1.0, 1.0)]),
        );
        el.status = ElementStatus::ReadyForService;
        let d = reg.describe("p_cable").unwrap();
        let rfs = reg.resolve_style(&el, StyleMode::View).unwrap();
        assert_ne!(rfs.color, d.style.view_color);

        el.highlighted = true;
        let hl = reg.resolve_style(&el, StyleMode::View).unwrap();
        assert_eq!(hl.color, d.style.highlight_color);
        assert!(hl.stroke_width > rfs.stroke_width);
    }
}
