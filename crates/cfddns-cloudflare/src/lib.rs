// # Cloudflare Record Store
//
// Cloudflare API v4 implementation of `cfddns_core::RecordStore`, plus the
// zone lookup done once at startup.
//
// ## Trust Level: Untrusted (DNS Provider)
//
// - One HTTP request per call, no retry and no backoff (owned by the scheduler)
// - No caching: every list goes to the API
// - Every request carries the client-level timeout (30 seconds)
// - Credentials never appear in logs or `Debug` output
//
// ## API Reference
//
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use cfddns_core::{Credentials, Error, RecordStore, RecordType, RemoteRecord, Result, Zone};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "cloudflare";

/// Cloudflare v4 API client
///
/// # Security
///
/// The Debug implementation never exposes the API key or token.
pub struct CloudflareClient {
    credentials: Credentials,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("credentials", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Common v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ZoneInfo {
    id: String,
    name: String,
}

impl CloudflareClient {
    /// Create a client against the public API
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_base_url(credentials, CLOUDFLARE_API_BASE)
    }

    /// Create a client against another base URL (tests, API proxies)
    pub fn with_base_url(credentials: Credentials, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Look up the zone identifier for a domain name
    ///
    /// Called once at startup; the returned [`Zone`] is held for the process
    /// lifetime.
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// ```
    pub async fn resolve_zone(&self, name: &str) -> Result<Zone> {
        debug!("Looking up zone ID for domain: {}", name);

        let zones: Vec<ZoneInfo> = self
            .call(self.request(Method::GET, "/zones").query(&[("name", name)]), name)
            .await?;

        let zone = zones
            .into_iter()
            .find(|z| z.name == name)
            .ok_or_else(|| Error::not_found(format!("zone {} could not be found", name)))?;

        debug!("Found zone ID: {}", zone.id);
        Ok(Zone::new(zone.id, zone.name))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Content-Type", "application/json");

        match &self.credentials {
            Credentials::Token(token) => builder.bearer_auth(token),
            Credentials::ApiKey { key, email } => builder
                .header("X-Auth-Key", key)
                .header("X-Auth-Email", email),
        }
    }

    /// Send a request and unwrap the `result` field of the envelope
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder, subject: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, subject, error_text(response).await));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

        if !envelope.success {
            return Err(Error::provider(PROVIDER, describe_errors(&envelope.errors)));
        }

        envelope
            .result
            .ok_or_else(|| Error::provider(PROVIDER, "Invalid response format: missing result"))
    }
}

#[async_trait]
impl RecordStore for CloudflareClient {
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=www.example.com&type=A
    /// ```
    async fn list(
        &self,
        zone: &Zone,
        fqdn: &str,
        record_type: RecordType,
    ) -> Result<Vec<RemoteRecord>> {
        let request = self
            .request(Method::GET, &format!("/zones/{}/dns_records", zone.id()))
            .query(&[("name", fqdn), ("type", record_type.as_str())]);

        let records: Vec<RemoteRecord> = self.call(request, fqdn).await?;
        debug!("{} {} record(s) listed for {}", records.len(), record_type, fqdn);
        Ok(records)
    }

    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// {"type": "A", "name": "www", "content": "203.0.113.7"}
    /// ```
    async fn create(
        &self,
        zone: &Zone,
        hostname: &str,
        record_type: RecordType,
        content: &str,
    ) -> Result<RemoteRecord> {
        let payload = serde_json::json!({
            "type": record_type.as_str(),
            "name": hostname,
            "content": content,
        });

        let request = self
            .request(Method::POST, &format!("/zones/{}/dns_records", zone.id()))
            .json(&payload);

        self.call(request, hostname).await
    }

    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// {"type": "A", "name": "www", "content": "203.0.113.7"}
    /// ```
    async fn update(
        &self,
        zone: &Zone,
        record_id: &str,
        hostname: &str,
        record_type: RecordType,
        content: &str,
    ) -> Result<()> {
        let payload = serde_json::json!({
            "type": record_type.as_str(),
            "name": hostname,
            "content": content,
        });

        let request = self
            .request(
                Method::PUT,
                &format!("/zones/{}/dns_records/{}", zone.id(), record_id),
            )
            .json(&payload);

        let _: serde_json::Value = self.call(request, hostname).await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

async fn error_text(response: Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string())
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, subject: &str, body: String) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API credentials or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(format!("{}: {}", subject, status)),
        409 => Error::provider(
            PROVIDER,
            format!("Conflict: record for {} already changed. Status: {}", subject, status),
        ),
        429 => Error::rate_limited(format!("Rate limit exceeded. Status: {}", status)),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, body),
        ),
        _ => Error::provider(PROVIDER, format!("{} - {}", status, body)),
    }
}

fn describe_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "request was not successful".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}
