// ── Association / network-id resolver ──
//
// After a geometry passes validation, the element gets its identifiers
// from the topology the validator reported: a unique id (layer prefix plus
// a random code) and a network id chained onto its first parent or, lacking
// one, onto the innermost containing region. Derived fields come from the
// layer's dependent-field resolver.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::gateway::Validated;
use crate::model::ElementRef;
use crate::registry::LayerDescriptor;

const CODE_LEN: usize = 6;

/// Prefix used when neither a parent nor a region is known.
const UNASSIGNED_PREFIX: &str = "NA";

/// Identifiers and derived fields for one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIds {
    pub unique_id: String,
    pub network_id: String,
    pub derived: Map<String, Value>,
}

impl ResolvedIds {
    /// Merge into a form payload, overriding user-entered values.
    pub fn apply_to(&self, data: &mut Map<String, Value>) {
        data.insert("unique_id".into(), Value::String(self.unique_id.clone()));
        data.insert("network_id".into(), Value::String(self.network_id.clone()));
        for (k, v) in &self.derived {
            data.insert(k.clone(), v.clone());
        }
    }
}

/// `prefix` followed by six uppercase alphanumerics.
pub fn generate_unique_id(prefix: &str) -> String {
    let code: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(CODE_LEN)
        .collect::<String>()
        .to_ascii_uppercase();
    format!("{prefix}{code}")
}

/// Network id of an element with `unique_id` under the given topology.
pub fn network_id(parents: &[ElementRef], region_chain: &[ElementRef], unique_id: &str) -> String {
    let parent = parents.first().and_then(|p| p.network_id.as_deref());
    let region = region_chain.last().and_then(|r| r.unique_id.as_deref());
    let base = parent.or(region).unwrap_or(UNASSIGNED_PREFIX);
    format!("{base}-{unique_id}")
}

/// Identifiers for a new element (`existing_unique_id == None`) or an
/// edited one, which keeps its unique id.
pub fn resolve(
    descriptor: &LayerDescriptor,
    existing_unique_id: Option<&str>,
    validated: &Validated,
) -> ResolvedIds {
    let unique_id = existing_unique_id
        .filter(|u| !u.is_empty())
        .map_or_else(|| generate_unique_id(&descriptor.id_prefix), str::to_owned);
    let network_id = network_id(&validated.parents, &validated.region_chain, &unique_id);
    ResolvedIds {
        derived: descriptor.resolve_dependent(&validated.children),
        unique_id,
        network_id,
    }
}
