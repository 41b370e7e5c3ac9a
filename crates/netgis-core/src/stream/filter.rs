// ── Status filter ──
//
// Narrows a layer's visible set from its master set. Applied in the store
// whenever the filter or the master set changes; never touches the cache.

use std::collections::HashSet;

use crate::model::{ElementStatus, GisElement};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(HashSet<ElementStatus>),
}

impl StatusFilter {
    pub fn only(statuses: impl IntoIterator<Item = ElementStatus>) -> Self {
        Self::Only(statuses.into_iter().collect())
    }

    pub fn matches(&self, element: &GisElement) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(&element.status),
        }
    }
}
