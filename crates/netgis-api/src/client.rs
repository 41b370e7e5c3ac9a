// GIS service HTTP client
//
// Wraps `reqwest::Client` with base-URL joining, status mapping and JSON
// decoding. Endpoint groups (layers, regions, validation, tickets) are
// implemented as inherent methods in sibling modules so this file stays
// focused on transport mechanics.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::FieldError;
use crate::transport::TransportConfig;

/// Raw HTTP client for the GIS service REST API.
///
/// Every method returns decoded payloads; non-success statuses are mapped
/// into [`Error`] variants before the caller sees them.
#[derive(Clone)]
pub struct GisClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GisClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the service root (e.g. `https://gis.example.net`); a
    /// trailing slash is added so relative API paths join beneath it.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { http, base_url }
    }

    /// The service base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for an API path: `{base}api/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(&format!("api/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_json(&url, resp).await
    }

    /// Send a POST request with JSON body and decode the JSON answer.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_json(&url, resp).await
    }

    /// Send a PUT request with JSON body and decode the JSON answer.
    pub(crate) async fn put<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        debug!("PUT {}", url);

        let resp = self
            .http
            .put(url.clone())
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_json(&url, resp).await
    }

    /// Send a POST request and hand back status and body untouched.
    ///
    /// Used by endpoints whose error statuses carry structured answers
    /// (geometry validation).
    pub(crate) async fn post_raw(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<(reqwest::StatusCode, String), Error> {
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if matches!(
            status,
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN
        ) {
            return Err(auth_error(status));
        }
        let body = resp.text().await.map_err(Error::Transport)?;
        Ok((status, body))
    }
}

fn auth_error(status: reqwest::StatusCode) -> Error {
    Error::Authentication {
        message: if status == reqwest::StatusCode::FORBIDDEN {
            "token lacks permission for this resource".into()
        } else {
            "token missing, expired or invalid".into()
        },
    }
}

/// Decode a JSON payload, keeping the raw body for diagnostics.
pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: body.to_owned(),
    })
}

/// Best-effort human message out of an error body.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["detail", "message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_owned))
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "empty response".into()
            } else {
                body.chars().take(200).collect()
            }
        })
}

/// Map the response status and decode a successful body.
async fn parse_json<T: DeserializeOwned>(url: &Url, resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if matches!(
        status,
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN
    ) {
        return Err(auth_error(status));
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    if status.is_success() {
        return decode(&body);
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::NotFound {
            path: url.path().to_owned(),
        });
    }

    if status == reqwest::StatusCode::BAD_REQUEST {
        let fields = FieldError::parse_body(&body);
        if !fields.is_empty() {
            return Err(Error::FieldErrors(fields));
        }
    }

    Err(Error::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}
