// ── Dependent-field resolvers ──
//
// Derived attributes computed from an element's children after a
// successful validation (e.g. a survey area's home-pass total). Resolvers
// are pure and attached to a layer descriptor.

use std::fmt;

use serde_json::{Map, Value};

use crate::model::{ElementRef, LayerKey};

/// Computes derived form fields from an element's children.
pub trait DependentFieldResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, children: &[ElementRef]) -> Map<String, Value>;
}

/// Sum of a numeric field over children of one layer.
#[derive(Debug, Clone)]
pub struct SumChildField {
    pub child_layer: LayerKey,
    pub source_field: String,
    pub target_field: String,
}

impl DependentFieldResolver for SumChildField {
    fn resolve(&self, children: &[ElementRef]) -> Map<String, Value> {
        let total: f64 = children
            .iter()
            .filter(|c| c.layer_key == self.child_layer)
            .filter_map(|c| c.numeric_attribute(&self.source_field))
            .sum();
        let mut out = Map::new();
        out.insert(self.target_field.clone(), number(total));
        out
    }
}

/// Number of children of one layer.
#[derive(Debug, Clone)]
pub struct CountChildren {
    pub child_layer: LayerKey,
    pub target_field: String,
}

impl DependentFieldResolver for CountChildren {
    fn resolve(&self, children: &[ElementRef]) -> Map<String, Value> {
        let count = children
            .iter()
            .filter(|c| c.layer_key == self.child_layer)
            .count();
        let mut out = Map::new();
        out.insert(self.target_field.clone(), Value::from(count));
        out
    }
}

/// Integral totals stay integers on the wire.
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn number(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        Value::from(v as i64)
    } else {
        serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::ElementId;
    use serde_json::json;

    fn child(layer: &str, id: u64, attrs: Value) -> ElementRef {
        ElementRef {
            layer_key: LayerKey::from(layer),
            id: ElementId::new(id),
            unique_id: None,
            network_id: None,
            name: None,
            attributes: attrs.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn sums_home_pass_of_buildings_only() {
        let r = SumChildField {
            child_layer: "survey_building".into(),
            source_field: "home_pass".into(),
            target_field: "home_pass".into(),
        };
        let children = vec![
            child("survey_building", 1, json!({"home_pass": 4})),
            child("survey_building", 2, json!({"home_pass": "6"})),
            child("p_dp", 3, json!({"home_pass": 100})),
            child("survey_building", 4, json!({})),
        ];
        assert_eq!(r.resolve(&children).get("home_pass"), Some(&json!(10)));
    }

    #[test]
    fn sum_of_nothing_is_zero() {
        let r = SumChildField {
            child_layer: "survey_building".into(),
            source_field: "home_pass".into(),
            target_field: "total".into(),
        };
        assert_eq!(r.resolve(&[]).get("total"), Some(&json!(0)));
    }

    #[test]
    fn counts_children_of_layer() {
        let r = CountChildren {
            child_layer: "p_splitter".into(),
            target_field: "splitter_count".into(),
        };
        let children = vec![
            child("p_splitter", 1, json!({})),
            child("p_splitter", 2, json!({})),
            child("p_cable", 3, json!({})),
        ];
        assert_eq!(r.resolve(&children).get("splitter_count"), Some(&json!(2)));
    }
}
