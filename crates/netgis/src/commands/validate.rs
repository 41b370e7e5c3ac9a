//! Validate command handler: ask the remote validator about a geometry
//! and preview the identifiers an element drawn there would get.

use serde::Serialize;

use netgis_core::gateway::ValidationOutcome;
use netgis_core::{
    ElementId, ElementRef, LayerKey, MapSession, ServerGeometry, ValidationScope, resolver,
};

use crate::cli::{GlobalOpts, ValidateArgs};
use crate::error::CliError;
use crate::output;

use super::util;

/// Accepted geometry with its topology and identifier preview.
#[derive(Debug, Serialize)]
struct ValidationReport {
    layer: String,
    parents: Vec<ElementRef>,
    children: Vec<ElementRef>,
    region_chain: Vec<ElementRef>,
    soft_errors: Vec<String>,
    unique_id: String,
    network_id: String,
}

fn ref_label(r: &ElementRef) -> String {
    let id = r
        .network_id
        .as_deref()
        .or(r.unique_id.as_deref())
        .or(r.name.as_deref())
        .map_or_else(|| format!("#{}", r.id), str::to_owned);
    format!("{} {id}", r.layer_key)
}

fn ref_list(refs: &[ElementRef]) -> String {
    util::or_dash(&refs.iter().map(ref_label).collect::<Vec<_>>().join(", "))
}

fn detail(r: &ValidationReport) -> String {
    let mut pairs = vec![
        ("Layer", r.layer.clone()),
        ("Result", "valid".to_owned()),
        ("Parents", ref_list(&r.parents)),
        ("Children", ref_list(&r.children)),
        ("Regions", ref_list(&r.region_chain)),
        ("Unique ID", r.unique_id.clone()),
        ("Network ID", r.network_id.clone()),
    ];
    if !r.soft_errors.is_empty() {
        pairs.push(("Warnings", r.soft_errors.join("; ")));
    }
    output::detail_lines(&pairs)
}

pub async fn handle(
    session: &MapSession,
    args: ValidateArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let layer = LayerKey::from(args.layer.as_str());
    let descriptor = session.registry().describe(&layer)?;

    let raw = util::read_geometry(args.geometry.as_deref(), args.from_file.as_deref())?;
    let geometry = ServerGeometry::from_raw(&raw, descriptor.feature_type)?.to_display();
    let scope = match args.ticket {
        Some(ticket_id) => ValidationScope::Ticket(ticket_id),
        None => ValidationScope::Regions(session.regions()),
    };
    let element_id = args.element_id.map(ElementId::new);

    let pb = util::spinner(format!("Validating {layer} geometry..."), global.quiet);
    let result = session
        .check_geometry(&layer, element_id, &geometry, &scope)
        .await;
    pb.finish_and_clear();

    let validated = match result? {
        ValidationOutcome::Valid(validated) => validated,
        ValidationOutcome::Intersects(rings) => {
            tracing::debug!(%layer, ?rings, "geometry intersects existing features");
            return Err(CliError::GeometryRejected { rings: rings.len() });
        }
        ValidationOutcome::OutsideBoundary(message) => {
            return Err(CliError::OutsideBoundary { message });
        }
    };

    let color = output::should_color(&global.color);
    for warning in &validated.soft_errors {
        output::warn_line(warning, color, global.quiet);
    }

    // Moved elements keep their unique id, which the validator does not
    // report; the preview always shows a fresh one.
    let ids = resolver::resolve(descriptor, None, &validated);
    let report = ValidationReport {
        layer: layer.to_string(),
        parents: validated.parents,
        children: validated.children,
        region_chain: validated.region_chain,
        soft_errors: validated.soft_errors,
        unique_id: ids.unique_id,
        network_id: ids.network_id,
    };
    let out = output::render_single(&global.output, &report, detail, |r| {
        r.network_id.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn node(layer: &str, network_id: Option<&str>) -> ElementRef {
        ElementRef {
            layer_key: LayerKey::from(layer),
            id: ElementId::new(9),
            unique_id: None,
            network_id: network_id.map(Into::into),
            name: None,
            attributes: Map::new(),
        }
    }

    #[test]
    fn refs_prefer_network_id() {
        assert_eq!(ref_label(&node("p_pop", Some("RN1-POP1"))), "p_pop RN1-POP1");
        assert_eq!(ref_label(&node("p_pop", None)), "p_pop #9");
    }

    #[test]
    fn empty_ref_list_is_a_dash() {
        assert_eq!(ref_list(&[]), "-");
    }
}
