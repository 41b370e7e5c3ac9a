//! Layer command handlers.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use netgis_core::registry::{FieldKind, FormField};
use netgis_core::{FeatureType, LayerConfig, LayerDescriptor, LayerRegistry};

use crate::cli::{GlobalOpts, LayersArgs, LayersCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Serializable view ───────────────────────────────────────────────

#[derive(Serialize)]
struct LayerView<'a> {
    key: &'a str,
    name: &'a str,
    feature_type: FeatureType,
    id_prefix: &'a str,
    parents: Vec<&'a str>,
    children: Vec<&'a str>,
    connectable: bool,
    fields: &'a [FormField],
}

impl<'a> From<&'a LayerDescriptor> for LayerView<'a> {
    fn from(d: &'a LayerDescriptor) -> Self {
        Self {
            key: d.key.as_str(),
            name: &d.name,
            feature_type: d.feature_type,
            id_prefix: &d.id_prefix,
            parents: d.parent_layers.iter().map(|k| k.as_str()).collect(),
            children: d.child_layers.iter().map(|k| k.as_str()).collect(),
            connectable: d.connectable,
            fields: &d.form,
        }
    }
}

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct LayerRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Geometry")]
    geometry: String,
    #[tabled(rename = "Prefix")]
    prefix: String,
    #[tabled(rename = "Parents")]
    parents: String,
    #[tabled(rename = "Children")]
    children: String,
}

impl From<&LayerView<'_>> for LayerRow {
    fn from(v: &LayerView<'_>) -> Self {
        Self {
            key: v.key.into(),
            name: v.name.into(),
            geometry: v.feature_type.to_string(),
            prefix: v.id_prefix.into(),
            parents: v.parents.join(", "),
            children: v.children.join(", "),
        }
    }
}

#[derive(Tabled)]
struct PermissionRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Add")]
    can_add: String,
    #[tabled(rename = "Edit")]
    can_edit: String,
}

impl From<&LayerConfig> for PermissionRow {
    fn from(c: &LayerConfig) -> Self {
        Self {
            key: c.layer_key.clone(),
            name: c.name.clone(),
            can_add: util::yes_no(c.can_add),
            can_edit: util::yes_no(c.can_edit),
        }
    }
}

// ── Detail view ─────────────────────────────────────────────────────

fn field_line(field: &FormField) -> String {
    let kind = match &field.kind {
        FieldKind::Text => "text".to_owned(),
        FieldKind::Number => "number".to_owned(),
        FieldKind::Checkbox => "checkbox".to_owned(),
        FieldKind::Select(options) => format!("one of {}", options.join("/")),
    };
    let marker = if field.required { "*" } else { "" };
    format!("{}{marker} ({kind})", field.name)
}

fn detail(v: &LayerView<'_>) -> String {
    let fields = v
        .fields
        .iter()
        .map(field_line)
        .collect::<Vec<_>>()
        .join(", ");
    output::detail_lines(&[
        ("Key", v.key.to_owned()),
        ("Name", v.name.to_owned()),
        ("Geometry", v.feature_type.to_string()),
        ("Id prefix", v.id_prefix.to_owned()),
        ("Parents", util::or_dash(&v.parents.join(", "))),
        ("Children", util::or_dash(&v.children.join(", "))),
        ("Connectable", util::yes_no(v.connectable)),
        ("Fields", fields),
    ])
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    registry: Arc<LayerRegistry>,
    args: LayersArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        LayersCommand::List => {
            let views: Vec<LayerView<'_>> = registry.iter().map(LayerView::from).collect();
            let out = output::render_list(
                &global.output,
                &views,
                |v| LayerRow::from(v),
                |v| v.key.to_owned(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        LayersCommand::Show { layer } => {
            let view = LayerView::from(registry.describe(&layer)?);
            let out = output::render_single(&global.output, &view, detail, |v| {
                v.key.to_owned()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        LayersCommand::Permissions => {
            let session = super::open_session(global, registry)?;
            let result = session.load_layer_configs().await;
            session.shutdown().await;
            let configs = result?;
            let out = output::render_list(
                &global.output,
                &configs,
                |c| PermissionRow::from(c),
                |c| c.layer_key.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
