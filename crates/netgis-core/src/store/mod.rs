// ── Reactive data store ──
//
// Per-layer element storage with push-based change notification and the
// viewport-filtered cache for oversized layers.

mod collection;
mod data_store;
mod filter;

pub use data_store::{DataStore, FetchOutcome, FetchTicket};
