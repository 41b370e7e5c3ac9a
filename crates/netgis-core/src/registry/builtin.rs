// ── Standard layer catalog ──

use super::{
    CountChildren, FormField, LayerDescriptor, LayerRegistry, LayerStyle, SumChildField,
};
use crate::model::{ElementStatus, FeatureType};

const STATUSES: &[&str] = &["P", "IP", "RFS", "IA"];

fn status_style(view_color: &str) -> LayerStyle {
    LayerStyle::new(view_color)
        .with_status_color(ElementStatus::Planned, "#9CA3AF")
        .with_status_color(ElementStatus::InProgress, "#F97316")
        .with_status_color(ElementStatus::ReadyForService, "#16A34A")
        .with_status_color(ElementStatus::Inactive, "#4B5563")
}

impl LayerRegistry {
    /// The standard fiber-network catalog.
    pub fn builtin() -> Self {
        Self::new()
            .with_layer(
                LayerDescriptor::new("region", "Region", FeatureType::MultiPolygon, "RG")
                    .with_style(LayerStyle::new("#6366F1").with_stroke_width(3.0))
                    .with_table_fields(&["unique_id", "name"])
                    .with_children(&["survey_area", "p_sa", "p_pop"]),
            )
            .with_layer(
                LayerDescriptor::new("survey_area", "Survey Area", FeatureType::Polygon, "SA")
                    .with_style(LayerStyle::new("#0EA5E9"))
                    .with_field(FormField::number("home_pass", "Home pass"))
                    .with_field(FormField::text("tags", "Tags"))
                    .with_table_fields(&["network_id", "name", "home_pass"])
                    .with_dependent_fields(SumChildField {
                        child_layer: "survey_building".into(),
                        source_field: "home_pass".into(),
                        target_field: "home_pass".into(),
                    })
                    .with_parents(&["region"])
                    .with_children(&["survey_building"]),
            )
            .with_layer(
                LayerDescriptor::new(
                    "survey_building",
                    "Survey Building",
                    FeatureType::Point,
                    "SB",
                )
                .with_style(LayerStyle::new("#A855F7").with_icon("building"))
                .with_field(FormField::number("home_pass", "Home pass").required())
                .with_field(FormField::number("floors", "Floors"))
                .with_field(FormField::select(
                    "building_type",
                    "Building type",
                    &["residential", "commercial", "mixed"],
                ))
                .with_table_fields(&["network_id", "name", "home_pass"])
                .with_parents(&["survey_area"]),
            )
            .with_layer(
                LayerDescriptor::new("p_pop", "Point of Presence", FeatureType::Point, "POP")
                    .with_style(status_style("#DC2626").with_icon("pop"))
                    .with_field(FormField::select("status", "Status", STATUSES))
                    .with_parents(&["region"])
                    .with_children(&["p_sa", "p_cable"])
                    .connectable(),
            )
            .with_layer(
                LayerDescriptor::new("p_sa", "Service Area", FeatureType::Polygon, "SV")
                    .with_style(LayerStyle::new("#14B8A6"))
                    .with_field(FormField::select("status", "Status", STATUSES))
                    .with_parents(&["region", "p_pop"])
                    .with_children(&["p_dp"]),
            )
            .with_layer(
                LayerDescriptor::new("p_dp", "Distribution Point", FeatureType::Point, "DP")
                    .with_style(status_style("#2563EB").with_icon("dp"))
                    .with_field(FormField::select("status", "Status", STATUSES))
                    .with_field(FormField::number("capacity", "Capacity"))
                    .with_table_fields(&["network_id", "name", "status", "splitter_count"])
                    .with_dependent_fields(CountChildren {
                        child_layer: "p_splitter".into(),
                        target_field: "splitter_count".into(),
                    })
                    .with_parents(&["p_sa"])
                    .with_children(&["p_splitter"]),
            )
            .with_layer(
                LayerDescriptor::new("p_splitter", "Splitter", FeatureType::Point, "SP")
                    .with_style(status_style("#EAB308").with_icon("splitter"))
                    .with_field(FormField::select("status", "Status", STATUSES))
                    .with_field(
                        FormField::select("ratio", "Ratio", &["1:2", "1:4", "1:8", "1:16", "1:32"])
                            .required(),
                    )
                    .with_parents(&["p_dp"])
                    .connectable(),
            )
            .with_layer(
                LayerDescriptor::new("p_cable", "Cable", FeatureType::Polyline, "CB")
                    .with_style(status_style("#111827").with_stroke_width(3.0))
                    .with_field(FormField::select("status", "Status", STATUSES))
                    .with_field(
                        FormField::select(
                            "cable_type",
                            "Cable type",
                            &["6F", "12F", "24F", "48F", "96F"],
                        )
                        .required(),
                    )
                    .with_field(FormField::number("length", "Length (m)"))
                    .with_table_fields(&["network_id", "name", "cable_type", "length"])
                    .with_parents(&["p_pop"])
                    .connectable(),
            )
    }
}
