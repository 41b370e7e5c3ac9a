// ── Layer style data ──
//
// Colours and icons only; drawing is the consumer's business.

use serde::Serialize;

use crate::model::{ElementStatus, GisElement};

/// Which look an element should have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleMode {
    View,
    Edit,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayerStyle {
    pub view_color: String,
    pub edit_color: String,
    pub highlight_color: String,
    pub icon: Option<String>,
    pub stroke_width: f32,
    /// Per-status overrides of `view_color`.
    pub status_colors: Vec<(ElementStatus, String)>,
}

impl LayerStyle {
    pub fn new(view_color: &str) -> Self {
        Self {
            view_color: view_color.into(),
            edit_color: "#F59E0B".into(),
            highlight_color: "#EF4444".into(),
            icon: None,
            stroke_width: 2.0,
            status_colors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn with_stroke_width(mut self, width: f32) -> Self {
        self.stroke_width = width;
        self
    }

    #[must_use]
    pub fn with_status_color(mut self, status: ElementStatus, color: &str) -> Self {
        self.status_colors.push((status, color.into()));
        self
    }

    /// Resolved look of one element.
    pub fn resolve(&self, element: &GisElement, mode: StyleMode) -> ElementStyle {
        let color = if element.highlighted {
            &self.highlight_color
        } else if mode == StyleMode::Edit {
            &self.edit_color
        } else {
            self.status_colors
                .iter()
                .find(|(s, _)| *s == element.status)
                .map_or(&self.view_color, |(_, c)| c)
        };
        ElementStyle {
            color: color.clone(),
            icon: self.icon.clone(),
            stroke_width: if element.highlighted {
                self.stroke_width * 2.0
            } else {
                self.stroke_width
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementStyle {
    pub color: String,
    pub icon: Option<String>,
    pub stroke_width: f32,
}
