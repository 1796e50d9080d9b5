// Hand-crafted async HTTP client for the tenant configuration API.
//
// Base path: /config/v1/
// Auth: X-API-KEY header

use std::future::Future;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::Error;
use crate::gate::RateGate;

const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

// ── Error response shape from the configuration API ──────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

// ── Pagination envelope ──────────────────────────────────────────────

/// One page of objects from a list endpoint.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u32,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for one tenant's configuration API.
///
/// Uses API-key authentication and communicates via JSON REST endpoints
/// under `/config/v1/`. List endpoints offer no server-side name filter;
/// callers fetch whole kind/location collections and filter locally.
pub struct TenantClient {
    http: reqwest::Client,
    base_url: Url,
    gate: RateGate,
}

impl TenantClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from an API key, tenant id, and transport config.
    ///
    /// Injects `X-API-KEY` and `X-Tenant-Id` as default headers on
    /// every request.
    pub fn from_api_key(
        base_url: &str,
        api_key: &secrecy::SecretString,
        tenant: &str,
        transport: &crate::TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut key_value =
            HeaderValue::from_str(api_key.expose_secret()).map_err(|e| Error::Authentication {
                message: format!("invalid API key header value: {e}"),
            })?;
        key_value.set_sensitive(true);
        headers.insert("X-API-KEY", key_value);

        let tenant_value = HeaderValue::from_str(tenant).map_err(|e| Error::Authentication {
            message: format!("invalid tenant id header value: {e}"),
        })?;
        headers.insert("X-Tenant-Id", tenant_value);

        let http = transport.build_client_with_headers(headers)?;
        let base_url = Self::normalize_base_url(base_url)?;

        Ok(Self {
            http,
            base_url,
            gate: RateGate::new(),
        })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self {
            http,
            base_url,
            gate: RateGate::new(),
        })
    }

    /// The pause/resume signal closed while a 429 back-off is in effect.
    pub fn gate(&self) -> RateGate {
        self.gate.clone()
    }

    /// Build the base URL ending in `/config/`.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;

        // Strip trailing slash for uniform handling
        let path = url.path().trim_end_matches('/').to_owned();

        if path.ends_with("/config") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/config/"));
        }

        Ok(url)
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join a relative path (e.g. `"v1/addresses"`) onto the base URL.
    fn url(&self, path: &str) -> Result<Url, Error> {
        // base_url always ends with `/config/`, so joining `v1/…` works.
        self.base_url.join(path).map_err(Error::from)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url} params={params:?}");

        let resp = self.http.get(url).query(params).send().await?;
        self.handle_response(resp).await
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        params: &[(&str, String)],
        body: &B,
    ) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).query(params).json(body).send().await?;
        self.handle_empty_response(resp).await
    }

    async fn put<B: Serialize + Sync>(
        &self,
        path: &str,
        params: &[(&str, String)],
        body: &B,
    ) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("PUT {url}");

        let resp = self.http.put(url).query(params).json(body).send().await?;
        self.handle_empty_response(resp).await
    }

    async fn delete(&self, path: &str, params: &[(&str, String)]) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("DELETE {url}");

        let resp = self.http.delete(url).query(params).send().await?;
        self.handle_empty_response(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            })
        } else {
            Err(self.error_from_response(resp).await)
        }
    }

    async fn handle_empty_response(&self, resp: reqwest::Response) -> Result<(), Error> {
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(self.error_from_response(resp).await)
        }
    }

    async fn error_from_response(&self, resp: reqwest::Response) -> Error {
        let status = resp.status();
        let path = resp.url().path().to_owned();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            self.gate
                .close_for(std::time::Duration::from_secs(retry_after_secs));
            return Error::RateLimited { retry_after_secs };
        }

        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Error::Authentication {
                message: format!("tenant rejected the request (HTTP {})", status.as_u16()),
            };
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Error::NotFound { path };
        }

        let body = resp.text().await.unwrap_or_default();
        let parsed: Option<ErrorResponse> = serde_json::from_str(&body).ok();
        let (message, code) = match parsed {
            Some(e) => (
                e.message.unwrap_or_else(|| body.clone()),
                e.code,
            ),
            None => (body, None),
        };

        Error::Api {
            message,
            code,
            status: status.as_u16(),
        }
    }

    // ── Object operations ────────────────────────────────────────────

    /// List one page of objects of a kind.
    ///
    /// `kind_path` is the endpoint segment (e.g. `"v1/addresses"`);
    /// `location` is the container query value (`"global"` for
    /// container-less kinds).
    pub async fn list_objects(
        &self,
        kind_path: &str,
        location: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<serde_json::Value>, Error> {
        self.get_with_params(
            kind_path,
            &[
                ("location", location.to_owned()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    /// Create an object. The payload carries the object name.
    pub async fn create_object(
        &self,
        kind_path: &str,
        location: &str,
        body: &serde_json::Value,
    ) -> Result<(), Error> {
        self.post(kind_path, &[("location", location.to_owned())], body)
            .await
    }

    /// Replace an existing object by name.
    pub async fn update_object(
        &self,
        kind_path: &str,
        name: &str,
        location: &str,
        body: &serde_json::Value,
    ) -> Result<(), Error> {
        self.put(
            &format!("{kind_path}/{name}"),
            &[("location", location.to_owned())],
            body,
        )
        .await
    }

    /// Delete an object by name.
    pub async fn delete_object(
        &self,
        kind_path: &str,
        name: &str,
        location: &str,
    ) -> Result<(), Error> {
        self.delete(
            &format!("{kind_path}/{name}"),
            &[("location", location.to_owned())],
        )
        .await
    }

    // ── Pagination ───────────────────────────────────────────────────

    /// Fetch every page of a collection by walking offset/limit.
    ///
    /// `fetch` is called with `(offset, limit)` until a short page or the
    /// reported total is reached.
    pub async fn paginate_all<T, F, Fut>(&self, limit: u32, fetch: F) -> Result<Vec<T>, Error>
    where
        F: Fn(u32, u32) -> Fut,
        Fut: Future<Output = Result<Page<T>, Error>>,
    {
        let mut all = Vec::new();
        let mut offset = 0u32;

        loop {
            let page = fetch(offset, limit).await?;
            let count = u32::try_from(page.data.len()).unwrap_or(u32::MAX);
            all.extend(page.data);

            if count < limit || (page.total > 0 && offset + count >= page.total) {
                break;
            }
            offset += count;
        }

        Ok(all)
    }
}
