// ── Domain model ──

pub mod element;
pub mod geometry;
pub mod ids;
pub mod network;
pub mod notice;
pub mod viewport;

pub use element::{Association, ElementRef, ElementStatus, GisElement};
pub use geometry::{
    BoundingBox, DisplayGeometry, FeatureType, LatLng, LngLat, ServerGeometry, Shape,
};
pub use ids::{ElementId, LayerKey};
pub use network::NetworkState;
pub use notice::Notice;
pub use viewport::{MapRegion, ViewportBounds};
