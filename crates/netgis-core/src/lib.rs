// netgis-core: Map data layer between netgis-api and consumers (CLI, map UIs).

pub mod config;
pub mod convert;
pub mod error;
pub mod gateway;
pub mod interaction;
pub mod model;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{MAX_CACHE_THRESHOLD, SessionConfig, TlsVerification};
pub use error::CoreError;
pub use gateway::{Validated, ValidationOutcome, ValidationScope};
pub use interaction::{FormPayload, Interaction, InteractionState, Submission, TicketLink};
pub use registry::{LayerDescriptor, LayerRegistry};
pub use resolver::ResolvedIds;
pub use session::{MapSession, SubmitOutcome};
pub use store::{DataStore, FetchOutcome, FetchTicket};
pub use stream::{ElementSnapshot, LayerStream, StatusFilter};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Identity
    ElementId, LayerKey,
    // Elements
    Association, ElementRef, ElementStatus, GisElement,
    // Geometry
    BoundingBox, DisplayGeometry, FeatureType, LatLng, LngLat, ServerGeometry, Shape,
    // Map state
    MapRegion, NetworkState, Notice, ViewportBounds,
};

// Wire types returned by `MapSession` as-is.
pub use netgis_api::RawCoordinates;
pub use netgis_api::models::{LayerConfig, RegionDetails, RegionSummary};
