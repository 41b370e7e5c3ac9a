// ── Per-layer network state ──

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Fetch lifecycle flags of one layer.
///
/// `count` is the unfiltered server count, kept for badges even when the
/// visible set is narrowed or empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkState {
    pub is_loading: bool,
    pub is_fetched: bool,
    pub is_cached: bool,
    pub is_error: bool,
    pub is_selected: bool,
    pub count: usize,
    pub last_fetched: Option<DateTime<Utc>>,
    /// Generation of the most recent fetch; older completions are dropped.
    #[serde(skip)]
    pub(crate) generation: u64,
}

impl NetworkState {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
