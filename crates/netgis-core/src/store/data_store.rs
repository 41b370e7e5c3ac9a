// ── Central reactive data store ──
//
// Per-layer network state, master and visible element sets, and the
// out-of-band cache for layers too large to hold reactively. Mutations
// are broadcast to subscribers via `watch` channels; the cache is never
// handed out, consumers only ever see visible projections.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::{DashMap, DashSet};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use super::collection::EntityCollection;
use super::filter::{filter_to_viewport, hit_test};
use crate::config::MAX_CACHE_THRESHOLD;
use crate::error::CoreError;
use crate::model::{
    Association, ElementId, GisElement, LatLng, LayerKey, NetworkState, Notice, ViewportBounds,
};
use crate::registry::LayerRegistry;
use crate::stream::{ElementSnapshot, LayerStream, StatusFilter};

const NOTICE_CHANNEL_SIZE: usize = 64;

/// Proof that a fetch was started; completion with an outdated ticket is
/// discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub layer: LayerKey,
    pub(crate) generation: u64,
}

/// What a completed fetch or viewport recomputation did to a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A fetch for the layer was already loading; nothing was started.
    AlreadyLoading,
    /// A newer fetch or an invalidation superseded this one.
    Superseded,
    /// Small layer: every element is visible.
    Inline { count: usize },
    /// Large layer narrowed to the viewport.
    Filtered { count: usize, in_view: usize },
    /// Large layer with too many elements in view; nothing published.
    TooManyInView { count: usize, in_view: usize },
    /// Large layer cached, waiting for a first viewport.
    AwaitingViewport { count: usize },
}

/// Out-of-band storage for layers above the cache threshold.
///
/// Written only by fetch completion and invalidation, read only by the
/// viewport filter.
#[derive(Default)]
pub(crate) struct GisCache {
    layers: DashMap<LayerKey, ElementSnapshot>,
}

impl GisCache {
    pub(crate) fn get(&self, layer: &LayerKey) -> Option<ElementSnapshot> {
        self.layers.get(layer).map(|r| Arc::clone(r.value()))
    }

    fn insert(&self, layer: LayerKey, elements: ElementSnapshot) {
        self.layers.insert(layer, elements);
    }

    fn remove(&self, layer: &LayerKey) -> bool {
        self.layers.remove(layer).is_some()
    }

    fn clear(&self) {
        self.layers.clear();
    }
}

struct LayerEntry {
    state: watch::Sender<NetworkState>,
    master: EntityCollection<ElementId, GisElement>,
    visible: watch::Sender<ElementSnapshot>,
    /// Elements hidden from the visible projection (under geometry edit).
    hidden: DashSet<ElementId>,
}

impl LayerEntry {
    fn new() -> Self {
        let (state, _) = watch::channel(NetworkState::default());
        let (visible, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            state,
            master: EntityCollection::new(),
            visible,
            hidden: DashSet::new(),
        }
    }

    fn state(&self) -> NetworkState {
        self.state.borrow().clone()
    }
}

/// Central reactive store for all map layers.
pub struct DataStore {
    registry: Arc<LayerRegistry>,
    threshold: usize,
    layers: DashMap<LayerKey, Arc<LayerEntry>>,
    pub(crate) cache: GisCache,
    viewport: watch::Sender<Option<ViewportBounds>>,
    status_filter: watch::Sender<StatusFilter>,
    highlight: watch::Sender<Option<(LayerKey, ElementId)>>,
    notices: broadcast::Sender<Notice>,
    generation: AtomicU64,
}

impl DataStore {
    pub fn new(registry: Arc<LayerRegistry>) -> Self {
        Self::with_threshold(registry, MAX_CACHE_THRESHOLD)
    }

    pub fn with_threshold(registry: Arc<LayerRegistry>, threshold: usize) -> Self {
        let (viewport, _) = watch::channel(None);
        let (status_filter, _) = watch::channel(StatusFilter::All);
        let (highlight, _) = watch::channel(None);
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_SIZE);
        Self {
            registry,
            threshold,
            layers: DashMap::new(),
            cache: GisCache::default(),
            viewport,
            status_filter,
            highlight,
            notices,
            generation: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<LayerRegistry> {
        &self.registry
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    // ── Fetch lifecycle ──────────────────────────────────────────────

    /// Start a fetch unless one is already loading for `layer`.
    ///
    /// Returns `Ok(None)` when a fetch is in flight.
    pub fn try_begin_fetch(&self, layer: &LayerKey) -> Result<Option<FetchTicket>, CoreError> {
        self.registry.describe(layer)?;
        let entry = self.entry(layer);
        let generation = self.next_generation();
        let started = entry.state.send_if_modified(|s| {
            if s.is_loading {
                return false;
            }
            mark_loading(s, generation);
            true
        });
        if !started {
            debug!(layer = %layer, "fetch already in flight");
            return Ok(None);
        }
        Ok(Some(FetchTicket {
            layer: layer.clone(),
            generation,
        }))
    }

    /// Start a fetch, superseding any fetch already in flight.
    pub fn begin_fetch(&self, layer: &LayerKey) -> Result<FetchTicket, CoreError> {
        self.registry.describe(layer)?;
        let entry = self.entry(layer);
        let generation = self.next_generation();
        entry.state.send_modify(|s| mark_loading(s, generation));
        Ok(FetchTicket {
            layer: layer.clone(),
            generation,
        })
    }

    /// Publish fetched elements for the ticket's layer.
    pub fn complete_fetch(&self, ticket: &FetchTicket, elements: Vec<GisElement>) -> FetchOutcome {
        let Some(entry) = self.existing(&ticket.layer) else {
            return FetchOutcome::Superseded;
        };
        let count = elements.len();
        let cached = count > self.threshold;
        let accepted = entry.state.send_if_modified(|s| {
            if s.generation != ticket.generation {
                return false;
            }
            s.is_loading = false;
            s.is_fetched = true;
            s.is_error = false;
            s.is_cached = cached;
            s.count = count;
            s.last_fetched = Some(Utc::now());
            true
        });
        if !accepted {
            warn!(layer = %ticket.layer, "discarding superseded fetch result");
            return FetchOutcome::Superseded;
        }

        let elements: Vec<Arc<GisElement>> = elements.into_iter().map(Arc::new).collect();
        if !cached {
            self.cache.remove(&ticket.layer);
            self.publish_master(&ticket.layer, &entry, elements);
            info!(layer = %ticket.layer, count, "layer loaded inline");
            return FetchOutcome::Inline { count };
        }

        self.cache.insert(ticket.layer.clone(), Arc::new(elements));
        let viewport = *self.viewport.borrow();
        match viewport {
            Some(vp) => self.refilter(&ticket.layer, &entry, &vp),
            None => {
                entry.master.clear();
                self.publish_visible(&ticket.layer, &entry);
                info!(layer = %ticket.layer, count, "layer cached, awaiting viewport");
                FetchOutcome::AwaitingViewport { count }
            }
        }
    }

    /// Record a failed fetch. Previously published data stays.
    pub fn fail_fetch(&self, ticket: &FetchTicket, message: &str) {
        let Some(entry) = self.existing(&ticket.layer) else {
            return;
        };
        let accepted = entry.state.send_if_modified(|s| {
            if s.generation != ticket.generation {
                return false;
            }
            s.is_loading = false;
            s.is_error = true;
            true
        });
        if accepted {
            warn!(layer = %ticket.layer, error = message, "layer fetch failed");
            let _ = self.notices.send(Notice::FetchFailed {
                layer: ticket.layer.clone(),
                message: message.to_owned(),
            });
        }
    }

    /// Drop a layer's cache and supersede in-flight fetches. The visible
    /// set stays until the next fetch completes.
    pub fn invalidate(&self, layer: &LayerKey) {
        self.cache.remove(layer);
        if let Some(entry) = self.existing(layer) {
            let generation = self.next_generation();
            entry.state.send_modify(|s| {
                s.generation = generation;
                s.is_loading = false;
                s.is_fetched = false;
            });
        }
        debug!(layer = %layer, "layer invalidated");
    }

    /// Unselect a layer and release everything it holds.
    pub fn deselect(&self, layer: &LayerKey) {
        self.cache.remove(layer);
        let Some(entry) = self.existing(layer) else {
            return;
        };
        let generation = self.next_generation();
        entry.state.send_modify(|s| {
            *s = NetworkState {
                generation,
                ..NetworkState::default()
            };
        });
        entry.master.clear();
        entry.hidden.clear();
        self.publish_visible(layer, &entry);
        debug!(layer = %layer, "layer deselected");
    }

    /// Drop every cache and supersede every in-flight fetch; selection is
    /// kept so the layers can be refetched for a new scope.
    pub fn invalidate_all(&self) {
        self.cache.clear();
        for key in self.layer_keys() {
            self.invalidate(&key);
        }
    }

    // ── Viewport and filters ─────────────────────────────────────────

    /// Recompute every selected cache-backed layer for a new viewport.
    /// Inline layers are left untouched.
    pub fn apply_viewport(&self, viewport: ViewportBounds) -> Vec<(LayerKey, FetchOutcome)> {
        self.viewport.send_replace(Some(viewport));
        let mut outcomes = Vec::new();
        for key in self.layer_keys() {
            let Some(entry) = self.existing(&key) else {
                continue;
            };
            let state = entry.state();
            if state.is_cached && state.is_selected {
                outcomes.push((key.clone(), self.refilter(&key, &entry, &viewport)));
            }
        }
        outcomes
    }

    pub fn viewport(&self) -> Option<ViewportBounds> {
        *self.viewport.borrow()
    }

    /// Narrow every layer's visible set by status.
    pub fn set_status_filter(&self, filter: StatusFilter) {
        if self.status_filter.send_if_modified(|f| {
            if *f == filter {
                return false;
            }
            *f = filter;
            true
        }) {
            for key in self.layer_keys() {
                if let Some(entry) = self.existing(&key) {
                    self.publish_visible(&key, &entry);
                }
            }
        }
    }

    pub fn status_filter(&self) -> StatusFilter {
        self.status_filter.borrow().clone()
    }

    // ── Element flags ────────────────────────────────────────────────

    /// Hide or show one element in the visible projection. The held
    /// copy carries the flag; the id is remembered across refetches.
    pub fn set_hidden(&self, layer: &LayerKey, id: ElementId, hidden: bool) {
        let entry = self.entry(layer);
        let changed = if hidden {
            entry.hidden.insert(id)
        } else {
            entry.hidden.remove(&id).is_some()
        };
        if !changed {
            return;
        }
        if let Some(el) = entry.master.get(&id) {
            let mut owned = (*el).clone();
            owned.hidden = hidden;
            entry.master.upsert(id, owned);
        }
        self.publish_visible(layer, &entry);
    }

    /// Highlight one element; replaces any previous highlight.
    pub fn highlight(&self, layer: &LayerKey, id: ElementId) {
        let previous = self.highlight.send_replace(Some((layer.clone(), id)));
        if let Some((prev_layer, _)) = previous {
            if &prev_layer != layer {
                self.reapply_highlight(&prev_layer);
            }
        }
        self.reapply_highlight(layer);
    }

    pub fn clear_highlight(&self) {
        if let Some((layer, _)) = self.highlight.send_replace(None) {
            self.reapply_highlight(&layer);
        }
    }

    pub fn highlighted(&self) -> Option<(LayerKey, ElementId)> {
        self.highlight.borrow().clone()
    }

    /// Attach loaded topology to a held element.
    pub fn set_association(&self, layer: &LayerKey, id: ElementId, association: Association) {
        let Some(entry) = self.existing(layer) else {
            return;
        };
        let Some(el) = entry.master.get(&id) else {
            return;
        };
        let mut owned = (*el).clone();
        owned.association = association;
        entry.master.upsert(id, owned);
        self.publish_visible(layer, &entry);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn network_state(&self, layer: &LayerKey) -> Option<NetworkState> {
        self.existing(layer).map(|e| e.state())
    }

    pub fn visible_snapshot(&self, layer: &LayerKey) -> ElementSnapshot {
        self.existing(layer)
            .map(|e| e.visible.borrow().clone())
            .unwrap_or_default()
    }

    pub fn master_snapshot(&self, layer: &LayerKey) -> ElementSnapshot {
        self.existing(layer)
            .map(|e| e.master.snapshot())
            .unwrap_or_default()
    }

    /// One element, looked up in the master set and then the cache.
    pub fn element(&self, layer: &LayerKey, id: ElementId) -> Option<Arc<GisElement>> {
        if let Some(el) = self.existing(layer).and_then(|e| e.master.get(&id)) {
            return Some(el);
        }
        self.cache
            .get(layer)
            .and_then(|all| all.iter().find(|e| e.id == id).cloned())
    }

    /// Layers currently selected, in key order.
    pub fn selected_layers(&self) -> Vec<LayerKey> {
        let mut keys: Vec<LayerKey> = self
            .layers
            .iter()
            .filter(|r| r.value().state.borrow().is_selected)
            .map(|r| r.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Visible elements of every selected layer near `point`.
    pub fn elements_at(&self, point: LatLng, zoom: f64) -> Vec<Arc<GisElement>> {
        let mut hits = Vec::new();
        for key in self.selected_layers() {
            let Ok(descriptor) = self.registry.describe(&key) else {
                continue;
            };
            let visible = self.visible_snapshot(&key);
            hits.extend(hit_test(&visible, point, zoom, descriptor.strategy()));
        }
        hits
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_layer(&self, layer: &LayerKey) -> LayerStream {
        LayerStream::new(self.entry(layer).visible.subscribe())
    }

    pub fn subscribe_state(&self, layer: &LayerKey) -> watch::Receiver<NetworkState> {
        self.entry(layer).state.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub(crate) fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn entry(&self, layer: &LayerKey) -> Arc<LayerEntry> {
        Arc::clone(
            self.layers
                .entry(layer.clone())
                .or_insert_with(|| Arc::new(LayerEntry::new()))
                .value(),
        )
    }

    fn existing(&self, layer: &LayerKey) -> Option<Arc<LayerEntry>> {
        self.layers.get(layer).map(|r| Arc::clone(r.value()))
    }

    fn layer_keys(&self) -> Vec<LayerKey> {
        self.layers.iter().map(|r| r.key().clone()).collect()
    }

    /// Run the viewport filter over a cached layer and publish the result.
    fn refilter(&self, layer: &LayerKey, entry: &LayerEntry, vp: &ViewportBounds) -> FetchOutcome {
        let count = entry.state().count;
        let (Some(cached), Ok(descriptor)) = (self.cache.get(layer), self.registry.describe(layer))
        else {
            return FetchOutcome::Superseded;
        };
        let in_view = filter_to_viewport(&cached, vp, descriptor.strategy());
        let n = in_view.len();
        if n > self.threshold {
            entry.master.clear();
            self.publish_visible(layer, entry);
            info!(layer = %layer, count, in_view = n, "too many elements in view");
            self.notify(Notice::ZoomIn {
                layer: layer.clone(),
                in_view: n,
            });
            return FetchOutcome::TooManyInView { count, in_view: n };
        }
        self.publish_master(layer, entry, in_view);
        debug!(layer = %layer, count, in_view = n, "viewport filter applied");
        FetchOutcome::Filtered { count, in_view: n }
    }

    /// Replace the master set, carrying the highlight and hidden flags over.
    fn publish_master(&self, layer: &LayerKey, entry: &LayerEntry, elements: Vec<Arc<GisElement>>) {
        let target = self.highlight_target(layer);
        entry.master.replace_all(elements.into_iter().map(|el| {
            let hidden = entry.hidden.contains(&el.id);
            (el.id, with_flags(el, target, hidden))
        }));
        if let Some(id) = target {
            if !entry.master.contains(&id) {
                debug!(layer = %layer, %id, "highlighted element out of view");
                self.notify(Notice::HighlightDropped {
                    layer: layer.clone(),
                    id,
                });
            }
        }
        self.publish_visible(layer, entry);
    }

    /// Recompute the visible projection: master minus hidden elements,
    /// narrowed by the status filter.
    fn publish_visible(&self, layer: &LayerKey, entry: &LayerEntry) {
        let filter = self.status_filter.borrow().clone();
        let visible: Vec<Arc<GisElement>> = entry
            .master
            .snapshot()
            .iter()
            .filter(|el| !el.hidden && filter.matches(el))
            .cloned()
            .collect();
        debug!(layer = %layer, visible = visible.len(), "visible set published");
        entry.visible.send_replace(Arc::new(visible));
    }

    fn reapply_highlight(&self, layer: &LayerKey) {
        let Some(entry) = self.existing(layer) else {
            return;
        };
        let master = entry.master.snapshot();
        self.publish_master(layer, &entry, master.to_vec());
    }

    fn highlight_target(&self, layer: &LayerKey) -> Option<ElementId> {
        match &*self.highlight.borrow() {
            Some((l, id)) if l == layer => Some(*id),
            _ => None,
        }
    }
}

fn mark_loading(s: &mut NetworkState, generation: u64) {
    s.is_loading = true;
    s.is_selected = true;
    s.is_error = false;
    s.generation = generation;
}

fn with_flags(el: Arc<GisElement>, target: Option<ElementId>, hidden: bool) -> Arc<GisElement> {
    let highlighted = target == Some(el.id);
    if el.highlighted == highlighted && el.hidden == hidden {
        return el;
    }
    let mut owned = (*el).clone();
    owned.highlighted = highlighted;
    owned.hidden = hidden;
    Arc::new(owned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{ElementStatus, LngLat, Shape};

    fn store() -> DataStore {
        DataStore::new(Arc::new(LayerRegistry::builtin()))
    }

    fn dp(id: u64, lat: f64, lng: f64) -> GisElement {
        GisElement::new(
            ElementId::new(id),
            LayerKey::from("p_dp"),
            Shape::Point(LngLat::new(lng, lat)),
        )
    }

    /// `n` points spread along the diagonal from (0,0) to (n*step, n*step).
    fn diagonal(n: u64, step: f64) -> Vec<GisElement> {
        (0..n)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let d = i as f64 * step;
                dp(i + 1, d, d)
            })
            .collect()
    }

    fn vp(max: f64) -> ViewportBounds {
        ViewportBounds::from_corners(LatLng::new(max, max), LatLng::new(-0.001, -0.001), 14.0)
    }

    fn key() -> LayerKey {
        LayerKey::from("p_dp")
    }

    #[test]
    fn begin_fetch_marks_loading_and_selected() {
        let s = store();
        let t = s.begin_fetch(&key()).unwrap();
        let st = s.network_state(&key()).unwrap();
        assert!(st.is_loading && st.is_selected);
        assert_eq!(st.generation(), t.generation);
        assert!(s.visible_snapshot(&key()).is_empty());
    }

    #[test]
    fn unknown_layer_cannot_fetch() {
        let s = store();
        assert!(matches!(
            s.begin_fetch(&LayerKey::from("nope")),
            Err(CoreError::UnknownLayer { .. })
        ));
    }

    #[test]
    fn try_begin_refuses_while_loading() {
        let s = store();
        assert!(s.try_begin_fetch(&key()).unwrap().is_some());
        assert!(s.try_begin_fetch(&key()).unwrap().is_none());
    }

    #[test]
    fn small_layer_is_inline() {
        let s = store();
        let t = s.begin_fetch(&key()).unwrap();
        let out = s.complete_fetch(&t, diagonal(10, 0.01));
        assert_eq!(out, FetchOutcome::Inline { count: 10 });
        let st = s.network_state(&key()).unwrap();
        assert!(!st.is_cached && !st.is_loading && st.is_fetched);
        assert_eq!(s.visible_snapshot(&key()).len(), 10);
        assert_eq!(s.master_snapshot(&key()).len(), 10);
        assert!(s.cache.get(&key()).is_none());
    }

    #[test]
    fn threshold_boundary() {
        let s = store();
        let t = s.begin_fetch(&key()).unwrap();
        assert_eq!(
            s.complete_fetch(&t, diagonal(200, 0.0001)),
            FetchOutcome::Inline { count: 200 }
        );
        let t = s.begin_fetch(&key()).unwrap();
        assert_eq!(
            s.complete_fetch(&t, diagonal(201, 0.0001)),
            FetchOutcome::AwaitingViewport { count: 201 }
        );
        assert!(s.network_state(&key()).unwrap().is_cached);
        assert!(s.visible_snapshot(&key()).is_empty());
    }

    #[test]
    fn cached_layer_narrows_to_viewport() {
        let s = store();
        s.apply_viewport(vp(0.0995));
        let t = s.begin_fetch(&key()).unwrap();
        // 300 points at 0.001 spacing; 100 fall inside the viewport.
        let out = s.complete_fetch(&t, diagonal(300, 0.001));
        assert_eq!(
            out,
            FetchOutcome::Filtered {
                count: 300,
                in_view: 100
            }
        );
        assert_eq!(s.network_state(&key()).unwrap().count, 300);
        assert_eq!(s.visible_snapshot(&key()).len(), 100);
    }

    #[test]
    fn same_viewport_twice_gives_same_visible_set() {
        let s = store();
        let t = s.begin_fetch(&key()).unwrap();
        s.complete_fetch(&t, diagonal(300, 0.001));

        let first = s.apply_viewport(vp(0.0995));
        let once: Vec<ElementId> = s.visible_snapshot(&key()).iter().map(|e| e.id).collect();
        let second = s.apply_viewport(vp(0.0995));
        let twice: Vec<ElementId> = s.visible_snapshot(&key()).iter().map(|e| e.id).collect();

        assert_eq!(first, second);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 100);
        let unique: std::collections::HashSet<_> = twice.iter().collect();
        assert_eq!(unique.len(), twice.len());
    }

    #[test]
    fn default_threshold_narrows_on_pan() {
        let s = store();
        s.apply_viewport(vp(0.1495));
        let t = s.begin_fetch(&key()).unwrap();
        assert_eq!(
            s.complete_fetch(&t, diagonal(500, 0.001)),
            FetchOutcome::Filtered {
                count: 500,
                in_view: 150
            }
        );
        assert_eq!(s.visible_snapshot(&key()).len(), 150);

        let panned = s.apply_viewport(vp(0.0395));
        assert_eq!(
            panned,
            vec![(key(), FetchOutcome::Filtered { count: 500, in_view: 40 })]
        );
        assert_eq!(s.visible_snapshot(&key()).len(), 40);
        let st = s.network_state(&key()).unwrap();
        assert!(st.is_cached && st.is_fetched && !st.is_loading);
    }

    #[test]
    fn visible_is_subset_of_master_is_subset_of_cache() {
        let s = store();
        s.apply_viewport(vp(0.0995));
        let t = s.begin_fetch(&key()).unwrap();
        s.complete_fetch(&t, diagonal(300, 0.001));
        s.set_status_filter(StatusFilter::only([ElementStatus::Unknown]));
        let cache = s.cache.get(&key()).unwrap();
        let master = s.master_snapshot(&key());
        let visible = s.visible_snapshot(&key());
        assert!(visible.iter().all(|v| master.iter().any(|m| m.id == v.id)));
        assert!(master.iter().all(|m| cache.iter().any(|c| c.id == m.id)));
    }

    #[test]
    fn superseded_fetch_is_discarded() {
        let s = store();
        let old = s.begin_fetch(&key()).unwrap();
        let new = s.begin_fetch(&key()).unwrap();
        assert_eq!(s.complete_fetch(&old, diagonal(5, 0.1)), FetchOutcome::Superseded);
        assert!(s.visible_snapshot(&key()).is_empty());
        assert!(s.network_state(&key()).unwrap().is_loading);
        assert_eq!(
            s.complete_fetch(&new, diagonal(3, 0.1)),
            FetchOutcome::Inline { count: 3 }
        );
    }

    #[test]
    fn failure_keeps_previous_data() {
        let s = store();
        let mut notices = s.subscribe_notices();
        let t = s.begin_fetch(&key()).unwrap();
        s.complete_fetch(&t, diagonal(4, 0.1));
        let t = s.begin_fetch(&key()).unwrap();
        s.fail_fetch(&t, "boom");
        let st = s.network_state(&key()).unwrap();
        assert!(st.is_error && !st.is_loading);
        assert_eq!(s.visible_snapshot(&key()).len(), 4);
        assert!(matches!(notices.try_recv(), Ok(Notice::FetchFailed { .. })));
    }

    #[test]
    fn status_filter_narrows_without_touching_master() {
        let s = store();
        let t = s.begin_fetch(&key()).unwrap();
        let mut els = diagonal(4, 0.1);
        els[0].status = ElementStatus::ReadyForService;
        els[1].status = ElementStatus::ReadyForService;
        s.complete_fetch(&t, els);
        s.set_status_filter(StatusFilter::only([ElementStatus::ReadyForService]));
        assert_eq!(s.visible_snapshot(&key()).len(), 2);
        assert_eq!(s.master_snapshot(&key()).len(), 4);
        s.set_status_filter(StatusFilter::All);
        assert_eq!(s.visible_snapshot(&key()).len(), 4);
    }

    #[test]
    fn hidden_elements_leave_visible_set() {
        let s = store();
        let t = s.begin_fetch(&key()).unwrap();
        s.complete_fetch(&t, diagonal(3, 0.1));
        s.set_hidden(&key(), ElementId::new(2), true);
        let ids: Vec<u64> = s.visible_snapshot(&key()).iter().map(|e| e.id.get()).collect();
        assert_eq!(ids, [1, 3]);
        assert!(s.element(&key(), ElementId::new(2)).unwrap().hidden);
        assert!(!s.element(&key(), ElementId::new(1)).unwrap().hidden);

        // A refetch keeps the element hidden.
        let t = s.begin_fetch(&key()).unwrap();
        s.complete_fetch(&t, diagonal(3, 0.1));
        assert!(s.element(&key(), ElementId::new(2)).unwrap().hidden);
        assert_eq!(s.visible_snapshot(&key()).len(), 2);

        s.set_hidden(&key(), ElementId::new(2), false);
        assert!(!s.element(&key(), ElementId::new(2)).unwrap().hidden);
        assert_eq!(s.visible_snapshot(&key()).len(), 3);
    }

    #[test]
    fn highlight_survives_refilter_when_in_view() {
        let s = store();
        s.apply_viewport(vp(0.0995));
        let t = s.begin_fetch(&key()).unwrap();
        s.complete_fetch(&t, diagonal(300, 0.001));
        s.highlight(&key(), ElementId::new(5));
        let hl = s.element(&key(), ElementId::new(5)).unwrap();
        assert!(hl.highlighted);

        // Move the viewport away: the highlight is dropped from the set.
        let mut notices = s.subscribe_notices();
        s.apply_viewport(ViewportBounds::from_corners(
            LatLng::new(0.25, 0.25),
            LatLng::new(0.2, 0.2),
            14.0,
        ));
        assert!(s.visible_snapshot(&key()).iter().all(|e| !e.highlighted));
        assert!(matches!(
            notices.try_recv(),
            Ok(Notice::HighlightDropped { .. })
        ));

        // And back: it is reapplied.
        s.apply_viewport(vp(0.0995));
        let back = s
            .visible_snapshot(&key())
            .iter()
            .find(|e| e.id.get() == 5)
            .cloned()
            .unwrap();
        assert!(back.highlighted);
    }

    #[test]
    fn deselect_releases_everything() {
        let s = store();
        let t = s.begin_fetch(&key()).unwrap();
        s.complete_fetch(&t, diagonal(250, 0.001));
        s.deselect(&key());
        let st = s.network_state(&key()).unwrap();
        assert!(!st.is_selected && !st.is_cached);
        assert!(s.cache.get(&key()).is_none());
        assert!(s.visible_snapshot(&key()).is_empty());
        assert!(s.selected_layers().is_empty());
    }

    #[test]
    fn invalidate_supersedes_in_flight_fetch() {
        let s = store();
        let t = s.begin_fetch(&key()).unwrap();
        s.invalidate(&key());
        assert_eq!(s.complete_fetch(&t, diagonal(2, 0.1)), FetchOutcome::Superseded);
    }

    #[test]
    fn hit_query_uses_visible_set() {
        let s = store();
        let t = s.begin_fetch(&key()).unwrap();
        s.complete_fetch(&t, vec![dp(1, 12.0, 77.0), dp(2, 13.0, 78.0)]);
        let hits = s.elements_at(LatLng::new(12.0, 77.0), 16.0);
        assert_eq!(hits.len(), 1);
        s.set_hidden(&key(), ElementId::new(1), true);
        assert!(s.elements_at(LatLng::new(12.0, 77.0), 16.0).is_empty());
    }
}
