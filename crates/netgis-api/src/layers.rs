// GIS layer endpoints
//
// Layer configuration, bulk layer data, single-element CRUD, and the
// association / connection sub-resources of an element.

use serde_json::{Map, Value};
use tracing::debug;

use crate::client::GisClient;
use crate::error::Error;
use crate::models::{
    AddAssociationRequest, AddConnectionRequest, AssociationsResponse, Connection, LayerConfig,
    LayerDataRequest, RawElement,
};

impl GisClient {
    /// Per-layer permissions and settings.
    ///
    /// `GET /api/gis-layer/configs/`
    pub async fn layer_configs(&self) -> Result<Vec<LayerConfig>, Error> {
        let url = self.api_url("gis-layer/configs/")?;
        self.get(url).await
    }

    /// All elements of a layer within the given regions.
    ///
    /// `POST /api/gis-layer/data/` with `{"regions": [...], "layer_key": "..."}`
    pub async fn layer_data(&self, layer_key: &str, regions: &[u64]) -> Result<Vec<RawElement>, Error> {
        let url = self.api_url("gis-layer/data/")?;
        debug!(layer = layer_key, ?regions, "requesting layer data");
        self.post(url, &LayerDataRequest { regions, layer_key }).await
    }

    /// Full record of one element.
    ///
    /// `GET /api/gis-layer/{layer}/{id}/`
    pub async fn element_details(&self, layer_key: &str, id: u64) -> Result<RawElement, Error> {
        let url = self.api_url(&format!("gis-layer/{layer_key}/{id}/"))?;
        self.get(url).await
    }

    /// Create an element. `data` is the complete form payload including
    /// geometry and resolved identifiers.
    ///
    /// `POST /api/gis-layer/{layer}/`
    pub async fn add_element(
        &self,
        layer_key: &str,
        data: &Map<String, Value>,
    ) -> Result<RawElement, Error> {
        let url = self.api_url(&format!("gis-layer/{layer_key}/"))?;
        debug!(layer = layer_key, "adding element");
        self.post(url, data).await
    }

    /// Replace an element's data.
    ///
    /// `PUT /api/gis-layer/{layer}/{id}/`
    pub async fn edit_element(
        &self,
        layer_key: &str,
        id: u64,
        data: &Map<String, Value>,
    ) -> Result<RawElement, Error> {
        let url = self.api_url(&format!("gis-layer/{layer_key}/{id}/"))?;
        debug!(layer = layer_key, id, "editing element");
        self.put(url, data).await
    }

    /// Parents and children of an element.
    ///
    /// `GET /api/gis-layer/{layer}/{id}/associations/`
    pub async fn element_associations(
        &self,
        layer_key: &str,
        id: u64,
    ) -> Result<AssociationsResponse, Error> {
        let url = self.api_url(&format!("gis-layer/{layer_key}/{id}/associations/"))?;
        self.get(url).await
    }

    /// Link another element as parent or child.
    ///
    /// `POST /api/gis-layer/{layer}/{id}/associations/`
    pub async fn add_association(
        &self,
        layer_key: &str,
        id: u64,
        request: &AddAssociationRequest,
    ) -> Result<(), Error> {
        let url = self.api_url(&format!("gis-layer/{layer_key}/{id}/associations/"))?;
        debug!(layer = layer_key, id, target = request.element_id, "adding association");
        let _: Value = self.post(url, request).await?;
        Ok(())
    }

    /// Connections of an element.
    ///
    /// `GET /api/gis-layer/{layer}/{id}/connections/`
    pub async fn element_connections(
        &self,
        layer_key: &str,
        id: u64,
    ) -> Result<Vec<Connection>, Error> {
        let url = self.api_url(&format!("gis-layer/{layer_key}/{id}/connections/"))?;
        self.get(url).await
    }

    /// Connect another element.
    ///
    /// `POST /api/gis-layer/{layer}/{id}/connections/`
    pub async fn add_connection(
        &self,
        layer_key: &str,
        id: u64,
        request: &AddConnectionRequest,
    ) -> Result<(), Error> {
        let url = self.api_url(&format!("gis-layer/{layer_key}/{id}/connections/"))?;
        debug!(layer = layer_key, id, target = request.element_id, "adding connection");
        let _: Value = self.post(url, request).await?;
        Ok(())
    }
}
