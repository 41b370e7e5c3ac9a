// ── Runtime session configuration ──
//
// Describes *how* to talk to the GIS service and how the map session
// behaves. Carries the token but never touches disk: the config crate or
// the CLI builds a `SessionConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// Elements above this count are cached out-of-band and viewport-filtered.
pub const MAX_CACHE_THRESHOLD: usize = 200;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (staging servers with self-signed certs).
    DangerAcceptInvalid,
}

/// Configuration for one map session against one GIS service.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Service URL (e.g. `https://gis.example.net`).
    pub url: Url,
    /// API token, sent as `Authorization: Token <secret>`.
    pub token: Option<SecretString>,
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Region scope of layer fetches.
    pub regions: Vec<u64>,
    /// Largest layer kept inline; bigger layers are viewport-filtered.
    pub cache_threshold: usize,
    /// Quiet period after the last viewport change before recomputing.
    pub viewport_debounce: Duration,
}

impl SessionConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            regions: Vec::new(),
            cache_threshold: MAX_CACHE_THRESHOLD,
            viewport_debounce: Duration::from_millis(300),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    #[must_use]
    pub fn with_regions(mut self, regions: Vec<u64>) -> Self {
        self.regions = regions;
        self
    }
}
