//! Fetch command handler: load one layer the way a map would and list
//! the elements it would draw.

use std::sync::Arc;

use tabled::Tabled;

use netgis_core::{
    FetchOutcome, GisElement, LatLng, LayerKey, MapSession, StatusFilter, ViewportBounds,
};

use crate::cli::{FetchArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct ElementRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Network ID")]
    network_id: String,
    #[tabled(rename = "Center")]
    center: String,
}

impl ElementRow {
    fn new(e: &GisElement, color: bool) -> Self {
        Self {
            id: e.id.get(),
            name: e.label(),
            status: output::paint_status(e.status, color),
            network_id: util::or_dash(e.network_id.as_deref().unwrap_or_default()),
            center: e.center.map_or_else(
                || "-".into(),
                |c| format!("{:.6}, {:.6}", c.latitude, c.longitude),
            ),
        }
    }
}

/// Stderr notice for outcomes that leave the listing empty or partial.
fn outcome_notice(layer: &LayerKey, outcome: &FetchOutcome) -> Option<String> {
    match outcome {
        FetchOutcome::TooManyInView { in_view, .. } => Some(format!(
            "{in_view} {layer} elements in view, zoom in (narrow --bbox or raise --zoom)"
        )),
        FetchOutcome::AwaitingViewport { count } => Some(format!(
            "{layer} has {count} elements, pass --bbox to choose which to show"
        )),
        FetchOutcome::Superseded | FetchOutcome::AlreadyLoading => {
            Some(format!("fetch of {layer} did not complete"))
        }
        FetchOutcome::Inline { .. } | FetchOutcome::Filtered { .. } => None,
    }
}

pub async fn handle(
    session: &MapSession,
    args: FetchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let layer = LayerKey::from(args.layer.as_str());
    session.registry().describe(&layer)?;

    if let Some([south, west, north, east]) = args.bbox {
        session.apply_viewport(ViewportBounds::from_corners(
            LatLng::new(north, east),
            LatLng::new(south, west),
            args.zoom,
        ));
    }
    if !args.status.is_empty() {
        let statuses = util::parse_statuses(&args.status)?;
        session.set_status_filter(StatusFilter::only(statuses));
    }

    let pb = util::spinner(format!("Fetching {layer}..."), global.quiet);
    let result = session.fetch_layer(&layer).await;
    pb.finish_and_clear();
    let outcome = result?;
    tracing::debug!(%layer, ?outcome, "fetch finished");

    let color = output::should_color(&global.color);
    if let Some(message) = outcome_notice(&layer, &outcome) {
        output::warn_line(&message, color, global.quiet);
    }

    let snapshot: Arc<Vec<Arc<GisElement>>> = session.visible(&layer).latest();
    let out = output::render_list(
        &global.output,
        &snapshot,
        |e| ElementRow::new(e, color),
        |e| e.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
