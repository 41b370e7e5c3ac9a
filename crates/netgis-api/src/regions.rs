// Region endpoints

use tracing::debug;

use crate::client::GisClient;
use crate::error::Error;
use crate::models::{RegionDetails, RegionSummary};

/// How much of each region the list endpoint returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionListMode {
    /// Identity only.
    Summary,
    /// Identity plus boundary coordinates.
    Detail,
}

impl RegionListMode {
    fn as_path(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Detail => "detail",
        }
    }
}

impl GisClient {
    /// List regions, optionally restricted to `ids`.
    ///
    /// `GET /api/region/list/{mode}/?ids=1,2`
    pub async fn region_list(
        &self,
        mode: RegionListMode,
        ids: &[u64],
    ) -> Result<Vec<RegionSummary>, Error> {
        let mut url = self.api_url(&format!("region/list/{}/", mode.as_path()))?;
        if !ids.is_empty() {
            let joined = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
            url.query_pairs_mut().append_pair("ids", &joined);
        }
        debug!(?mode, count = ids.len(), "listing regions");
        self.get(url).await
    }

    /// Full record of one region.
    ///
    /// `GET /api/region/{id}/`
    pub async fn region_details(&self, id: u64) -> Result<RegionDetails, Error> {
        let url = self.api_url(&format!("region/{id}/"))?;
        self.get(url).await
    }
}
