//! Transport seam between entity operations and the remote inventory API.
//!
//! [`GamTransport`] is the narrow interface the reconciliation engine
//! consumes; [`RestTransport`] is a reqwest-backed implementation against a
//! REST gateway exposing `POST {base_url}/{service}/{method}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::TransportError;
use crate::record::Record;

/// Default timeout for API requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Narrow interface to the remote inventory API.
///
/// `submit` must return, for each accepted input record, an output record
/// whose `name` matches the input's. Post-create verification relies on
/// this contract; a backend that renames on create will surface as a
/// verification failure, not as a transport error.
#[async_trait]
pub trait GamTransport: Send + Sync {
    /// Lists records matching `filter` via `service`/`method`. `fields` is
    /// the allowlist of filter fields sent over the wire; unlisted fields
    /// never leave the process.
    async fn list(
        &self,
        service: &str,
        method: &str,
        filter: &Record,
        fields: Option<&[&str]>,
    ) -> Result<Vec<Record>, TransportError>;

    /// Creates `records` via `service`/`method`. `fields` is the allowlist
    /// of record fields sent over the wire; unlisted fields never leave the
    /// process.
    async fn submit(
        &self,
        service: &str,
        method: &str,
        records: &[Record],
        fields: Option<&[&str]>,
    ) -> Result<Vec<Record>, TransportError>;
}

#[derive(Debug, Serialize)]
struct ListBody {
    filter: Record,
}

#[derive(Debug, Serialize)]
struct SubmitBody {
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    results: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

/// REST gateway implementation of [`GamTransport`].
#[derive(Debug, Clone)]
pub struct RestTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RestTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into(),
            token: None,
        }
    }

    /// Attach a bearer token to every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn endpoint(&self, service: &str, method: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            service,
            method
        )
    }

    async fn post_records<B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<Vec<Record>, TransportError> {
        let mut request = self.client.post(url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::api(status.as_u16(), error_message(&text)));
        }
        let parsed: RecordsResponse = serde_json::from_str(&text)?;
        debug!(%url, count = parsed.results.len(), "api response");
        Ok(parsed.results)
    }
}

/// Structured error message when the body carries one, truncated raw body
/// otherwise.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.chars().take(MAX_ERROR_BODY_CHARS).collect())
}

#[async_trait]
impl GamTransport for RestTransport {
    async fn list(
        &self,
        service: &str,
        method: &str,
        filter: &Record,
        fields: Option<&[&str]>,
    ) -> Result<Vec<Record>, TransportError> {
        let filter = match fields {
            Some(allowlist) => filter.project(allowlist),
            None => filter.clone(),
        };
        let url = self.endpoint(service, method);
        self.post_records(&url, &ListBody { filter }).await
    }

    async fn submit(
        &self,
        service: &str,
        method: &str,
        records: &[Record],
        fields: Option<&[&str]>,
    ) -> Result<Vec<Record>, TransportError> {
        let records = match fields {
            Some(allowlist) => records.iter().map(|r| r.project(allowlist)).collect(),
            None => records.to_vec(),
        };
        let url = self.endpoint(service, method);
        self.post_records(&url, &SubmitBody { records }).await
    }
}
