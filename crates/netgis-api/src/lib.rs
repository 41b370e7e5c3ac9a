//! Async Rust client for the netgis GIS service.
//!
//! The remote service is the source of truth for layer data, element
//! topology and geometry legality. This crate only speaks its wire format:
//!
//! - **[`GisClient`]**: `reqwest`-backed client with token auth, URL
//!   construction, status mapping and JSON decoding. Endpoint groups
//!   (layers, regions, validation, tickets) live in separate modules as
//!   inherent methods.
//! - **[`models`]**: wire types. Geometry arrives as untyped nested
//!   `[lng, lat]` arrays ([`models::RawCoordinates`]); interpreting it
//!   requires the layer's feature type and happens in `netgis-core`.
//! - **[`Error`]**: every transport and protocol failure mode.

pub mod client;
pub mod error;
pub mod layers;
pub mod models;
pub mod regions;
pub mod tickets;
pub mod transport;
pub mod validation;

pub use client::GisClient;
pub use error::Error;
pub use models::{FieldError, RawCoordinates, RawElement, ValidationResponse};
pub use regions::RegionListMode;
pub use transport::{TlsMode, TransportConfig};
