// ── Map session ──
//
// Owns one connection to the GIS service, the data store and the live
// interaction state. Every workflow goes through here: fetching layers,
// reacting to the viewport, driving the interaction machine and running
// the submit pipeline (validate → resolve → commit → invalidate → reset).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::join_all;
use netgis_api::models::{
    AddAssociationRequest, AddConnectionRequest, AssociationSide, LayerConfig, RegionDetails,
    RegionSummary,
};
use netgis_api::{GisClient, RawElement, RegionListMode, TlsMode, TransportConfig};
use serde_json::Value;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{SessionConfig, TlsVerification};
use crate::convert::{element_from_raw, elements_from_raw, region_to_raw};
use crate::error::CoreError;
use crate::gateway::{self, ValidationScope};
use crate::interaction::{Interaction, InteractionState, TicketLink};
use crate::model::{
    Association, DisplayGeometry, ElementId, ElementRef, FeatureType, GisElement, LatLng, LayerKey,
    NetworkState, Notice, ServerGeometry, ViewportBounds,
};
use crate::registry::{LayerRegistry, check_form};
use crate::resolver;
use crate::store::{DataStore, FetchOutcome};
use crate::stream::{LayerStream, StatusFilter};

/// Zoom used for tap hit-testing before any viewport is known.
const DEFAULT_TAP_ZOOM: f64 = 16.0;

/// Result of a successful submit.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub layer: LayerKey,
    pub id: ElementId,
    pub created: bool,
    pub unique_id: String,
    pub network_id: String,
    pub soft_errors: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
enum Permission {
    Add,
    Edit,
}

impl Permission {
    fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Edit => "edit",
        }
    }
}

// ── MapSession ──────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Call
/// [`connect()`](Self::connect) before use and
/// [`shutdown()`](Self::shutdown) when done.
#[derive(Clone)]
pub struct MapSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    client: GisClient,
    store: Arc<DataStore>,
    interaction: watch::Sender<InteractionState>,
    regions: watch::Sender<Vec<u64>>,
    layer_configs: DashMap<LayerKey, LayerConfig>,
    configs_loaded: AtomicBool,
    /// Latest viewport request, consumed by the debounce task.
    viewport_requests: watch::Sender<Option<ViewportBounds>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl MapSession {
    /// Build a session. Does NOT talk to the service; call
    /// [`connect()`](Self::connect) to load layer permissions and start
    /// background tasks.
    pub fn new(config: SessionConfig, registry: Arc<LayerRegistry>) -> Result<Self, CoreError> {
        let client = GisClient::new(config.url.clone(), &build_transport(&config))?;
        let store = Arc::new(DataStore::with_threshold(registry, config.cache_threshold));
        let (interaction, _) = watch::channel(InteractionState::default());
        let (regions, _) = watch::channel(config.regions.clone());
        let (viewport_requests, _) = watch::channel(None);

        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                client,
                store,
                interaction,
                regions,
                layer_configs: DashMap::new(),
                configs_loaded: AtomicBool::new(false),
                viewport_requests,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    pub fn registry(&self) -> &Arc<LayerRegistry> {
        self.inner.store.registry()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Load layer permissions and spawn the viewport debounce task.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.load_layer_configs().await?;

        let rx = self.inner.viewport_requests.subscribe();
        let store = Arc::clone(&self.inner.store);
        let cancel = self.inner.cancel.clone();
        let debounce = self.inner.config.viewport_debounce;
        self.inner
            .task_handles
            .lock()
            .await
            .push(tokio::spawn(viewport_task(store, rx, debounce, cancel)));

        info!(url = %self.inner.config.url, "map session connected");
        Ok(())
    }

    /// Cancel background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("map session shut down");
    }

    /// One-shot: connect, run closure, shut down.
    pub async fn oneshot<F, Fut, T>(
        config: SessionConfig,
        registry: Arc<LayerRegistry>,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(MapSession) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let session = MapSession::new(config, registry)?;
        session.connect().await?;
        let result = f(session.clone()).await;
        session.shutdown().await;
        result
    }

    // ── Layer permissions ────────────────────────────────────────────

    /// Fetch per-layer permissions from the service.
    pub async fn load_layer_configs(&self) -> Result<Vec<LayerConfig>, CoreError> {
        let configs = self.inner.client.layer_configs().await?;
        self.inner.layer_configs.clear();
        for c in &configs {
            self.inner
                .layer_configs
                .insert(LayerKey::from(c.layer_key.as_str()), c.clone());
        }
        self.inner.configs_loaded.store(true, Ordering::Release);
        debug!(count = configs.len(), "layer configs loaded");
        Ok(configs)
    }

    pub fn layer_config(&self, layer: &LayerKey) -> Option<LayerConfig> {
        self.inner.layer_configs.get(layer).map(|r| r.value().clone())
    }

    /// Layers unknown to the service are allowed, as is everything before
    /// configs have been loaded.
    pub fn can_add(&self, layer: &LayerKey) -> bool {
        self.permitted(layer, Permission::Add)
    }

    pub fn can_edit(&self, layer: &LayerKey) -> bool {
        self.permitted(layer, Permission::Edit)
    }

    fn permitted(&self, layer: &LayerKey, permission: Permission) -> bool {
        if !self.inner.configs_loaded.load(Ordering::Acquire) {
            return true;
        }
        self.inner
            .layer_configs
            .get(layer)
            .is_none_or(|c| match permission {
                Permission::Add => c.can_add,
                Permission::Edit => c.can_edit,
            })
    }

    fn require(&self, layer: &LayerKey, permission: Permission) -> Result<(), CoreError> {
        if self.permitted(layer, permission) {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied {
                layer: layer.to_string(),
                action: permission.as_str().into(),
            })
        }
    }

    // ── Regions ──────────────────────────────────────────────────────

    /// Region scope of layer fetches.
    pub fn regions(&self) -> Vec<u64> {
        self.inner.regions.borrow().clone()
    }

    /// All regions the service knows about, without boundaries.
    pub async fn list_regions(&self) -> Result<Vec<RegionSummary>, CoreError> {
        Ok(self
            .inner
            .client
            .region_list(RegionListMode::Summary, &[])
            .await?)
    }

    /// Change the region scope. Caches are dropped and every selected
    /// layer is refetched for the new scope.
    pub async fn select_regions(
        &self,
        regions: Vec<u64>,
    ) -> Vec<(LayerKey, Result<FetchOutcome, CoreError>)> {
        debug!(?regions, "region scope changed");
        self.inner.regions.send_replace(regions);
        self.inner.store.invalidate_all();
        let layers = self.inner.store.selected_layers();
        let results = join_all(layers.iter().map(|layer| self.refetch(layer))).await;
        layers.into_iter().zip(results).collect()
    }

    pub async fn show_region_details(&self, region_id: u64) -> Result<RegionDetails, CoreError> {
        let details = self.inner.client.region_details(region_id).await?;
        self.update(|s| {
            s.replace(Interaction::ShowRegionDetails { region_id });
            Ok(())
        })?;
        Ok(details)
    }

    // ── Fetching ─────────────────────────────────────────────────────

    /// Fetch a layer for the current region scope unless a fetch for it
    /// is already loading.
    pub async fn fetch_layer(&self, layer: &LayerKey) -> Result<FetchOutcome, CoreError> {
        let Some(ticket) = self.inner.store.try_begin_fetch(layer)? else {
            return Ok(FetchOutcome::AlreadyLoading);
        };
        self.run_fetch(ticket).await
    }

    /// Fetch a layer, superseding any fetch in flight.
    pub async fn refetch(&self, layer: &LayerKey) -> Result<FetchOutcome, CoreError> {
        let ticket = self.inner.store.begin_fetch(layer)?;
        self.run_fetch(ticket).await
    }

    async fn run_fetch(&self, ticket: crate::store::FetchTicket) -> Result<FetchOutcome, CoreError> {
        let regions = self.regions();
        match self.load_elements(&ticket.layer, &regions).await {
            Ok(elements) => Ok(self.inner.store.complete_fetch(&ticket, elements)),
            Err(e) => {
                let message = e.to_string();
                self.inner.store.fail_fetch(&ticket, &message);
                Err(CoreError::FetchFailed {
                    layer: ticket.layer.to_string(),
                    message,
                })
            }
        }
    }

    async fn load_elements(
        &self,
        layer: &LayerKey,
        regions: &[u64],
    ) -> Result<Vec<GisElement>, CoreError> {
        let descriptor = self.registry().describe(layer)?;
        let raw: Vec<RawElement> = if layer.is_region() {
            self.inner
                .client
                .region_list(RegionListMode::Detail, regions)
                .await?
                .into_iter()
                .filter_map(region_to_raw)
                .collect()
        } else {
            self.inner.client.layer_data(layer.as_str(), regions).await?
        };
        let (elements, skipped) = elements_from_raw(descriptor, raw);
        if skipped > 0 {
            warn!(layer = %layer, skipped, "elements with unusable geometry skipped");
        }
        Ok(elements)
    }

    /// Unselect a layer and drop its data.
    pub fn deselect_layer(&self, layer: &LayerKey) {
        self.inner.store.deselect(layer);
    }

    // ── Viewport and filters ─────────────────────────────────────────

    /// Queue a viewport change; cached layers are recomputed once the
    /// viewport has been quiet for `viewport_debounce`.
    pub fn set_viewport(&self, viewport: ViewportBounds) {
        self.inner.viewport_requests.send_replace(Some(viewport));
    }

    /// Recompute cached layers for `viewport` right away.
    pub fn apply_viewport(&self, viewport: ViewportBounds) -> Vec<(LayerKey, FetchOutcome)> {
        self.inner.store.apply_viewport(viewport)
    }

    pub fn set_status_filter(&self, filter: StatusFilter) {
        self.inner.store.set_status_filter(filter);
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn interaction(&self) -> InteractionState {
        self.inner.interaction.borrow().clone()
    }

    pub fn subscribe_interaction(&self) -> watch::Receiver<InteractionState> {
        self.inner.interaction.subscribe()
    }

    pub fn visible(&self, layer: &LayerKey) -> LayerStream {
        self.inner.store.subscribe_layer(layer)
    }

    pub fn network_state(&self, layer: &LayerKey) -> Option<NetworkState> {
        self.inner.store.network_state(layer)
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.store.subscribe_notices()
    }

    // ── Interaction entry points ─────────────────────────────────────

    /// Drop whatever workflow is running.
    pub fn cancel(&self) {
        // Infallible reducer; the result carries nothing.
        let _ = self.update(|s| {
            s.cancel();
            Ok(())
        });
    }

    /// Offer the layers the user may add to.
    pub fn select_add_layer(&self) -> Result<Vec<LayerKey>, CoreError> {
        let layers: Vec<LayerKey> = self
            .registry()
            .iter()
            .map(|d| d.key.clone())
            .filter(|k| self.can_add(k))
            .collect();
        self.update(|s| {
            s.replace(Interaction::SelectAddLayer {
                layers: layers.clone(),
            });
            Ok(())
        })?;
        Ok(layers)
    }

    /// Start drawing a new element of `layer`.
    pub fn start_add(&self, layer: &LayerKey) -> Result<(), CoreError> {
        self.require(layer, Permission::Add)?;
        let registry = Arc::clone(self.registry());
        self.update(|s| s.start_add(&registry, layer.clone()))
    }

    /// Feed a map tap to the current interaction: a vertex while drawing,
    /// a hit query while selecting on the map.
    pub fn tap_map(&self, point: LatLng) -> Result<(), CoreError> {
        let selecting = matches!(
            self.inner.interaction.borrow().interaction,
            Interaction::SelectElementsOnMapClick
        );
        if selecting {
            let zoom = self
                .inner
                .store
                .viewport()
                .map_or(DEFAULT_TAP_ZOOM, |v| v.zoom);
            let candidates: Vec<(LayerKey, ElementId)> = self
                .inner
                .store
                .elements_at(point, zoom)
                .iter()
                .map(|e| (e.layer_key.clone(), e.id))
                .collect();
            debug!(hits = candidates.len(), "map tap hit query");
            return self.update(|s| {
                s.replace(Interaction::ListElementsOnMap { point, candidates });
                Ok(())
            });
        }
        let registry = Arc::clone(self.registry());
        self.update(|s| s.tap(&registry, point))
    }

    pub fn undo_last_vertex(&self) -> Result<(), CoreError> {
        self.update(InteractionState::undo_last_vertex)
    }

    pub fn confirm_geometry(&self) -> Result<(), CoreError> {
        let registry = Arc::clone(self.registry());
        self.update(|s| s.confirm_geometry(&registry))
    }

    /// Enter tap-to-select mode.
    pub fn select_on_map(&self) -> Result<(), CoreError> {
        self.update(|s| {
            s.replace(Interaction::SelectElementsOnMapClick);
            Ok(())
        })
    }

    /// Open the details of an element, loading it from the service when
    /// it is not held locally.
    pub async fn show_element(
        &self,
        layer: &LayerKey,
        id: ElementId,
    ) -> Result<Arc<GisElement>, CoreError> {
        let element = self.element(layer, id).await?;
        self.update(|s| {
            s.replace(Interaction::ShowElementDetails {
                layer: layer.clone(),
                id,
            });
            Ok(())
        })?;
        Ok(element)
    }

    /// Highlight an element and centre the workflow on it.
    pub fn show_on_map(&self, layer: &LayerKey, id: ElementId) -> Result<(), CoreError> {
        self.registry().describe(layer)?;
        self.inner.store.highlight(layer, id);
        self.update(|s| {
            s.replace(Interaction::ShowElementOnMap {
                layer: layer.clone(),
                id,
            });
            Ok(())
        })
    }

    /// `ShowElementDetails` → redraw the element.
    pub async fn edit_location(&self, layer: &LayerKey, id: ElementId) -> Result<(), CoreError> {
        self.require(layer, Permission::Edit)?;
        let element = self.element(layer, id).await?;
        let registry = Arc::clone(self.registry());
        self.update(|s| s.edit_location(&registry, &element))
    }

    /// `ShowElementDetails` → edit the element's attributes.
    pub async fn edit_details(&self, layer: &LayerKey, id: ElementId) -> Result<(), CoreError> {
        self.require(layer, Permission::Edit)?;
        let element = self.element(layer, id).await?;
        self.update(|s| s.edit_details(&element))
    }

    pub fn set_field(&self, name: &str, value: Value) -> Result<(), CoreError> {
        self.update(|s| s.set_field(name, value))
    }

    async fn element(&self, layer: &LayerKey, id: ElementId) -> Result<Arc<GisElement>, CoreError> {
        if let Some(el) = self.inner.store.element(layer, id) {
            return Ok(el);
        }
        let descriptor = self.registry().describe(layer)?;
        let raw = self
            .inner
            .client
            .element_details(layer.as_str(), id.get())
            .await?;
        Ok(Arc::new(element_from_raw(descriptor, raw)?))
    }

    // ── Submit pipeline ──────────────────────────────────────────────

    /// Ask the validator about a geometry without touching the
    /// interaction state.
    pub async fn check_geometry(
        &self,
        layer: &LayerKey,
        element_id: Option<ElementId>,
        geometry: &DisplayGeometry,
        scope: &ValidationScope,
    ) -> Result<gateway::ValidationOutcome, CoreError> {
        self.registry().describe(layer)?;
        let request = gateway::build_request(layer, element_id, geometry, scope);
        gateway::validate(&self.inner.client, &request).await
    }

    /// Validate, resolve identifiers, commit and refresh the pending
    /// add/edit form.
    ///
    /// Field errors are attached to the form and the interaction stays.
    /// A rejected geometry leaves its rings on the interaction state.
    pub async fn submit(&self) -> Result<SubmitOutcome, CoreError> {
        let (submission, scope, ticket) = {
            let state = self.inner.interaction.borrow();
            let scope = match &state.ticket {
                Some(t) => ValidationScope::Ticket(t.ticket_id),
                None => ValidationScope::Regions(self.regions()),
            };
            (
                state.submission()?,
                scope,
                state.ticket.as_ref().map(|t| t.ticket_id),
            )
        };
        let generation = submission.generation;
        let layer = submission.layer.clone();
        let created = submission.element_id.is_none();
        self.require(
            &layer,
            if created {
                Permission::Add
            } else {
                Permission::Edit
            },
        )?;
        let descriptor = self.registry().describe(&layer)?;

        // Local form checks.
        let errors = check_form(&descriptor.form, &submission.data);
        if !errors.is_empty() {
            self.update_current(generation, |s| s.attach_errors(errors.clone()))?;
            return Err(CoreError::FormFieldErrors(errors));
        }

        // Validate.
        self.update_current(generation, |s| {
            s.clear_error_polygons();
            Ok(())
        })?;
        let request = gateway::build_request(
            &layer,
            submission.element_id,
            &submission.geometry,
            &scope,
        );
        let outcome = gateway::validate(&self.inner.client, &request).await?;
        let validated =
            self.update_current(generation, |s| Ok(gateway::apply_outcome(s, outcome)))??;
        for message in &validated.soft_errors {
            self.inner.store.notify(Notice::SoftWarning {
                message: message.clone(),
            });
        }

        // Resolve identifiers.
        let ids = resolver::resolve(descriptor, submission.unique_id.as_deref(), &validated);
        let mut data = submission.data.clone();
        ids.apply_to(&mut data);
        data.insert(
            "coordinates".into(),
            serde_json::to_value(submission.geometry.to_server().to_raw()).map_err(|e| {
                CoreError::Api {
                    message: format!("cannot encode geometry: {e}"),
                    status: None,
                }
            })?,
        );
        if let Some(ticket_id) = ticket {
            data.insert("ticket_id".into(), Value::from(ticket_id));
        }

        // Commit.
        let committed = match submission.element_id {
            None => self.inner.client.add_element(layer.as_str(), &data).await,
            Some(id) => {
                self.inner
                    .client
                    .edit_element(layer.as_str(), id.get(), &data)
                    .await
            }
        };
        let raw = match committed {
            Ok(raw) => raw,
            Err(netgis_api::Error::FieldErrors(fields)) => {
                let errors: Vec<_> = fields
                    .into_iter()
                    .map(|f| crate::registry::FormFieldError {
                        field: f.field,
                        message: f.message,
                    })
                    .collect();
                self.update_current(generation, |s| s.attach_errors(errors.clone()))?;
                return Err(CoreError::FormFieldErrors(errors));
            }
            Err(e) => return Err(e.into()),
        };
        info!(
            layer = %layer,
            id = raw.id,
            network_id = %ids.network_id,
            created,
            "element committed"
        );

        // Invalidate and refresh.
        match ticket {
            Some(ticket_id) => {
                if let Err(e) = self.refresh_ticket(ticket_id).await {
                    warn!(ticket_id, error = %e, "ticket refresh after commit failed");
                }
            }
            None => {
                self.inner.store.invalidate(&layer);
                let selected = self
                    .inner
                    .store
                    .network_state(&layer)
                    .is_some_and(|s| s.is_selected);
                if selected {
                    if let Err(e) = self.refetch(&layer).await {
                        warn!(layer = %layer, error = %e, "refetch after commit failed");
                    }
                }
            }
        }

        // Reset, unless the user has already moved on.
        if self
            .update_current(generation, |s| {
                s.cancel();
                Ok(())
            })
            .is_err()
        {
            debug!("interaction changed during submit; not resetting");
        }

        Ok(SubmitOutcome {
            layer,
            id: ElementId::new(raw.id),
            created,
            unique_id: ids.unique_id,
            network_id: ids.network_id,
            soft_errors: validated.soft_errors,
        })
    }

    // ── Tickets ──────────────────────────────────────────────────────

    /// Scope the session to a ticket and show its work orders.
    pub async fn load_ticket(
        &self,
        ticket_id: u64,
    ) -> Result<Vec<(LayerKey, FetchOutcome)>, CoreError> {
        let (area_pocket, work_orders, outcomes) = self.fetch_ticket(ticket_id).await?;
        self.update(|s| {
            s.set_ticket(Some(TicketLink {
                ticket_id,
                area_pocket,
            }));
            s.replace(Interaction::ShowTicketWorkOrders {
                ticket_id,
                work_orders,
            });
            Ok(())
        })?;
        info!(ticket_id, layers = outcomes.len(), "ticket loaded");
        Ok(outcomes)
    }

    /// Leave ticket scope; validation goes back to the selected regions.
    pub fn clear_ticket(&self) {
        let _ = self.update(|s| {
            s.set_ticket(None);
            Ok(())
        });
    }

    async fn refresh_ticket(&self, ticket_id: u64) -> Result<(), CoreError> {
        let (area_pocket, _, _) = self.fetch_ticket(ticket_id).await?;
        self.update(|s| {
            if let Some(t) = &mut s.ticket {
                t.area_pocket = area_pocket;
            }
            Ok(())
        })
    }

    /// Work orders grouped by layer and published through the normal
    /// fetch-success path.
    #[allow(clippy::type_complexity)]
    async fn fetch_ticket(
        &self,
        ticket_id: u64,
    ) -> Result<
        (
            Option<DisplayGeometry>,
            Vec<(LayerKey, ElementId)>,
            Vec<(LayerKey, FetchOutcome)>,
        ),
        CoreError,
    > {
        let orders = self.inner.client.ticket_work_orders(ticket_id).await?;
        let area_pocket = orders
            .area_pocket
            .and_then(|p| {
                ServerGeometry::from_raw(&p.coordinates, FeatureType::Polygon)
                    .or_else(|_| ServerGeometry::from_raw(&p.coordinates, FeatureType::MultiPolygon))
                    .ok()
            })
            .map(|g| g.to_display());

        let mut by_layer: BTreeMap<LayerKey, Vec<RawElement>> = BTreeMap::new();
        for order in orders.work_orders {
            let mut element = order.element;
            if element.status.is_none() {
                element.status = order.status;
            }
            by_layer
                .entry(LayerKey::from(order.layer_key))
                .or_default()
                .push(element);
        }

        let mut work_orders = Vec::new();
        let mut outcomes = Vec::new();
        for (layer, raw) in by_layer {
            let Ok(descriptor) = self.registry().describe(&layer) else {
                warn!(layer = %layer, "work orders for unknown layer ignored");
                continue;
            };
            let ticket = self.inner.store.begin_fetch(&layer)?;
            let (elements, _) = elements_from_raw(descriptor, raw);
            work_orders.extend(elements.iter().map(|e| (layer.clone(), e.id)));
            let outcome = self.inner.store.complete_fetch(&ticket, elements);
            outcomes.push((layer, outcome));
        }
        Ok((area_pocket, work_orders, outcomes))
    }

    // ── Associations ─────────────────────────────────────────────────

    /// Load an element's parents and children.
    pub async fn show_associations(
        &self,
        layer: &LayerKey,
        id: ElementId,
    ) -> Result<Association, CoreError> {
        self.registry().describe(layer)?;
        let response = self
            .inner
            .client
            .element_associations(layer.as_str(), id.get())
            .await?;
        let association = Association {
            parents: response.parents.into_iter().map(ElementRef::from).collect(),
            children: response.children.into_iter().map(ElementRef::from).collect(),
        };
        self.inner
            .store
            .set_association(layer, id, association.clone());
        self.update(|s| {
            s.replace(Interaction::ShowAssociatedElements {
                layer: layer.clone(),
                id,
                association: association.clone(),
            });
            Ok(())
        })?;
        Ok(association)
    }

    /// Visible elements of `target_layer` that may be linked to the
    /// element.
    pub fn show_possible_associations(
        &self,
        layer: &LayerKey,
        id: ElementId,
        target_layer: &LayerKey,
    ) -> Result<Vec<ElementId>, CoreError> {
        let descriptor = self.registry().describe(layer)?;
        if !descriptor.relates_to(target_layer) {
            return Err(CoreError::InvalidTransition {
                action: format!("associate {target_layer}"),
                state: format!("{layer} has no such parent or child layer"),
            });
        }
        let candidates = self.candidates(target_layer, Some((layer, id)));
        self.update(|s| {
            s.replace(Interaction::ShowPossibleAddAssociation {
                layer: layer.clone(),
                id,
                target_layer: target_layer.clone(),
                candidates: candidates.clone(),
            });
            Ok(())
        })?;
        Ok(candidates)
    }

    /// Link the chosen candidate and reload the associations.
    pub async fn add_association(&self, target: ElementId) -> Result<Association, CoreError> {
        let (layer, id, target_layer) = match &self.inner.interaction.borrow().interaction {
            Interaction::ShowPossibleAddAssociation {
                layer,
                id,
                target_layer,
                candidates,
            } if candidates.contains(&target) => (layer.clone(), *id, target_layer.clone()),
            Interaction::ShowPossibleAddAssociation { target_layer, .. } => {
                return Err(CoreError::NotFound {
                    entity_type: target_layer.to_string(),
                    identifier: target.to_string(),
                });
            }
            other => {
                return Err(CoreError::InvalidTransition {
                    action: "add an association".into(),
                    state: other.name().into(),
                });
            }
        };
        let descriptor = self.registry().describe(&layer)?;
        let side = if descriptor.parent_layers.contains(&target_layer) {
            AssociationSide::Parent
        } else {
            AssociationSide::Child
        };
        self.inner
            .client
            .add_association(
                layer.as_str(),
                id.get(),
                &AddAssociationRequest {
                    layer_key: target_layer.to_string(),
                    element_id: target.get(),
                    side,
                },
            )
            .await?;
        info!(layer = %layer, %id, target = %target, ?side, "association added");
        self.show_associations(&layer, id).await
    }

    // ── Connections ──────────────────────────────────────────────────

    pub async fn show_connections(
        &self,
        layer: &LayerKey,
        id: ElementId,
    ) -> Result<Vec<ElementRef>, CoreError> {
        self.require_connectable(layer)?;
        let connections: Vec<ElementRef> = self
            .inner
            .client
            .element_connections(layer.as_str(), id.get())
            .await?
            .into_iter()
            .map(ElementRef::from)
            .collect();
        self.update(|s| {
            s.replace(Interaction::ShowElementConnections {
                layer: layer.clone(),
                id,
                connections: connections.clone(),
            });
            Ok(())
        })?;
        Ok(connections)
    }

    /// Offer visible elements of `target_layer` to connect to.
    pub fn start_connection(
        &self,
        layer: &LayerKey,
        id: ElementId,
        target_layer: &LayerKey,
    ) -> Result<Vec<ElementId>, CoreError> {
        self.require_connectable(layer)?;
        self.require_connectable(target_layer)?;
        let candidates = self.candidates(target_layer, Some((layer, id)));
        self.update(|s| {
            s.replace(Interaction::AddElementConnection {
                layer: layer.clone(),
                id,
                target_layer: target_layer.clone(),
                candidates: candidates.clone(),
            });
            Ok(())
        })?;
        Ok(candidates)
    }

    /// Connect the chosen candidate and reload the connections.
    pub async fn add_connection(
        &self,
        target: ElementId,
        port: Option<String>,
    ) -> Result<Vec<ElementRef>, CoreError> {
        let (layer, id, target_layer) = match &self.inner.interaction.borrow().interaction {
            Interaction::AddElementConnection {
                layer,
                id,
                target_layer,
                candidates,
            } if candidates.contains(&target) => (layer.clone(), *id, target_layer.clone()),
            Interaction::AddElementConnection { target_layer, .. } => {
                return Err(CoreError::NotFound {
                    entity_type: target_layer.to_string(),
                    identifier: target.to_string(),
                });
            }
            other => {
                return Err(CoreError::InvalidTransition {
                    action: "add a connection".into(),
                    state: other.name().into(),
                });
            }
        };
        self.inner
            .client
            .add_connection(
                layer.as_str(),
                id.get(),
                &AddConnectionRequest {
                    layer_key: target_layer.to_string(),
                    element_id: target.get(),
                    port,
                },
            )
            .await?;
        info!(layer = %layer, %id, target = %target, "connection added");
        self.show_connections(&layer, id).await
    }

    fn require_connectable(&self, layer: &LayerKey) -> Result<(), CoreError> {
        if self.registry().describe(layer)?.connectable {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                action: "manage connections".into(),
                state: format!("{layer} is not connectable"),
            })
        }
    }

    /// Visible ids of `layer`, excluding `exclude`.
    fn candidates(&self, layer: &LayerKey, exclude: Option<(&LayerKey, ElementId)>) -> Vec<ElementId> {
        self.inner
            .store
            .visible_snapshot(layer)
            .iter()
            .filter(|e| exclude != Some((&e.layer_key, e.id)))
            .map(|e| e.id)
            .collect()
    }

    // ── State plumbing ───────────────────────────────────────────────

    /// Run a reducer on the interaction state and publish the result.
    ///
    /// Nothing is published when the reducer fails. The element hidden
    /// for geometry editing follows the interaction.
    fn update<T>(
        &self,
        f: impl FnOnce(&mut InteractionState) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        self.update_if(None, f)
    }

    /// Like [`update`](Self::update), but only while the interaction is
    /// still the one with `generation`.
    fn update_current<T>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut InteractionState) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        self.update_if(Some(generation), f)
    }

    fn update_if<T>(
        &self,
        generation: Option<u64>,
        f: impl FnOnce(&mut InteractionState) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut out = None;
        self.inner.interaction.send_if_modified(|state| {
            if generation.is_some_and(|g| g != state.generation()) {
                out = Some(Err(CoreError::StaleInteraction));
                return false;
            }
            let before = hidden_target(state);
            let result = f(state);
            let ok = result.is_ok();
            out = Some(result.map(|v| (v, before, hidden_target(state))));
            ok
        });
        let (value, before, after) = out.unwrap_or(Err(CoreError::StaleInteraction))?;
        if before != after {
            if let Some((layer, id)) = before {
                self.inner.store.set_hidden(&layer, id, false);
            }
            if let Some((layer, id)) = after {
                self.inner.store.set_hidden(&layer, id, true);
            }
        }
        Ok(value)
    }
}

fn hidden_target(state: &InteractionState) -> Option<(LayerKey, ElementId)> {
    state
        .interaction
        .hidden_element()
        .map(|(layer, id)| (layer.clone(), id))
}

// ── Background tasks ─────────────────────────────────────────────────

/// Apply the latest viewport once it has been quiet for `debounce`.
async fn viewport_task(
    store: Arc<DataStore>,
    mut rx: watch::Receiver<Option<ViewportBounds>>,
    debounce: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                () = tokio::time::sleep(debounce) => break,
            }
        }

        let latest = *rx.borrow_and_update();
        if let Some(viewport) = latest {
            let outcomes = store.apply_viewport(viewport);
            debug!(layers = outcomes.len(), zoom = viewport.zoom, "viewport applied");
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn build_transport(config: &SessionConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
        token: config.token.clone(),
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
