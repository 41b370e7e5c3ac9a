// ── Session notices ──
//
// Non-fatal conditions a consumer should surface to the user. Delivered on
// a broadcast channel; nothing is stored.

use serde::Serialize;

use super::ids::{ElementId, LayerKey};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Cached layer has more elements in view than can be shown.
    ZoomIn { layer: LayerKey, in_view: usize },
    /// Advisory message from a successful validation.
    SoftWarning { message: String },
    /// A layer fetch failed; previous data, if any, is still shown.
    FetchFailed { layer: LayerKey, message: String },
    /// The highlighted element left the visible set.
    HighlightDropped { layer: LayerKey, id: ElementId },
}
