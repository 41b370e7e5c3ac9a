//! Region command handlers.

use tabled::Tabled;

use netgis_core::{MapSession, RegionDetails, RegionSummary};

use crate::cli::{GlobalOpts, RegionsArgs, RegionsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct RegionRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Unique ID")]
    unique_id: String,
    #[tabled(rename = "Parent")]
    parent: String,
}

impl From<&RegionSummary> for RegionRow {
    fn from(r: &RegionSummary) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            unique_id: util::or_dash(r.unique_id.as_deref().unwrap_or_default()),
            parent: r.parent.map_or_else(|| "-".into(), |p| p.to_string()),
        }
    }
}

fn detail(r: &RegionDetails) -> String {
    let mut pairs = vec![
        ("ID", r.id.to_string()),
        ("Name", r.name.clone()),
        (
            "Unique ID",
            util::or_dash(r.unique_id.as_deref().unwrap_or_default()),
        ),
        (
            "Parent",
            r.parent.map_or_else(|| "-".into(), |p| p.to_string()),
        ),
        (
            "Boundary",
            if r.coordinates.is_some() {
                "yes".into()
            } else {
                "no".into()
            },
        ),
    ];
    for (key, value) in &r.extra {
        let shown = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        pairs.push((key.as_str(), shown));
    }
    output::detail_lines(&pairs)
}

pub async fn handle(
    session: &MapSession,
    args: RegionsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        RegionsCommand::List => {
            let regions = session.list_regions().await?;
            let out = output::render_list(
                &global.output,
                &regions,
                |r| RegionRow::from(r),
                |r| r.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RegionsCommand::Show { id } => {
            let details = session.show_region_details(id).await?;
            let out = output::render_single(&global.output, &details, detail, |r| {
                r.id.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
