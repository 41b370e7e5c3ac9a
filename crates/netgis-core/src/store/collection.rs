// ── Generic element collection ──
//
// Concurrent storage with O(1) lookups by id and a key-ordered snapshot
// held in a `watch` channel.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// A concurrent collection of one entity type keyed by `K`.
///
/// Every mutation rebuilds the snapshot. Snapshots are ordered by key so
/// consumers see a stable order across rebuilds.
pub(crate) struct EntityCollection<K, T>
where
    K: Eq + Hash + Ord + Copy + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    by_id: DashMap<K, Arc<T>>,

    /// Full snapshot, rebuilt on mutation.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<K, T> EntityCollection<K, T>
where
    K: Eq + Hash + Ord + Copy + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_id: DashMap::new(),
            snapshot,
        }
    }

    /// Insert or update an entity. Returns `true` if the id was new.
    pub(crate) fn upsert(&self, id: K, entity: T) -> bool {
        let is_new = self.by_id.insert(id, Arc::new(entity)).is_none();
        self.rebuild_snapshot();
        is_new
    }

    /// Replace the whole contents with one snapshot rebuild.
    pub(crate) fn replace_all(&self, entities: impl IntoIterator<Item = (K, Arc<T>)>) {
        self.by_id.clear();
        for (id, entity) in entities {
            self.by_id.insert(id, entity);
        }
        self.rebuild_snapshot();
    }

    pub(crate) fn get(&self, id: &K) -> Option<Arc<T>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, id: &K) -> bool {
        self.by_id.contains_key(id)
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Remove all entities.
    pub(crate) fn clear(&self) {
        self.by_id.clear();
        self.rebuild_snapshot();
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Collect all values into a key-ordered snapshot.
    fn rebuild_snapshot(&self) {
        let mut entries: Vec<(K, Arc<T>)> = self
            .by_id
            .iter()
            .map(|r| (*r.key(), Arc::clone(r.value())))
            .collect();
        entries.sort_by_key(|(k, _)| *k);
        let values = entries.into_iter().map(|(_, v)| v).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn upsert_returns_true_for_new_id() {
        let col: EntityCollection<u64, String> = EntityCollection::new();
        assert!(col.upsert(1, "hello".into()));
        assert!(!col.upsert(1, "world".into()));
        assert_eq!(*col.get(&1).unwrap(), "world");
    }

    #[test]
    fn clear_empties_snapshot() {
        let col: EntityCollection<u64, String> = EntityCollection::new();
        col.upsert(1, "a".into());
        col.upsert(2, "b".into());
        assert!(col.contains(&2));
        col.clear();
        assert!(!col.contains(&2));
        assert!(col.snapshot().is_empty());
    }

    #[test]
    fn snapshot_is_ordered_by_id() {
        let col: EntityCollection<u64, String> = EntityCollection::new();
        col.replace_all([(3, Arc::new("c".to_string())), (1, Arc::new("a".to_string()))]);
        col.upsert(2, "b".into());
        let snap: Vec<String> = col.snapshot().iter().map(|s| (**s).clone()).collect();
        assert_eq!(snap, ["a", "b", "c"]);
    }
}
