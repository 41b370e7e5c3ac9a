// ── Reactive layer streams ──
//
// Subscription types for consuming visible-set changes from the DataStore.

mod filter;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub use filter::StatusFilter;

use crate::model::GisElement;

/// Snapshot of a layer's visible elements.
pub type ElementSnapshot = Arc<Vec<Arc<GisElement>>>;

/// A subscription to one layer's visible set.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via [`changed()`](Self::changed) or by converting to a
/// `Stream`.
pub struct LayerStream {
    current: ElementSnapshot,
    receiver: watch::Receiver<ElementSnapshot>,
}

impl LayerStream {
    pub(crate) fn new(receiver: watch::Receiver<ElementSnapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation time (or at the last `changed()`).
    pub fn current(&self) -> &ElementSnapshot {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> ElementSnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the store has been dropped.
    pub async fn changed(&mut self) -> Option<ElementSnapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> LayerWatchStream {
        LayerWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct LayerWatchStream {
    inner: WatchStream<ElementSnapshot>,
}

impl Stream for LayerWatchStream {
    type Item = ElementSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
