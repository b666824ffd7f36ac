//! HTTP client for the volkszaehler middleware

use super::model::{
    exception_message, DataResponse, EntitiesResponse, ExceptionEnvelope, PrognosisResponse,
};
use super::Backend;
use crate::error::BackendError;
use crate::query::infer_bucket;
use crate::types::{EntityTree, Tuple};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Endpoint used to check that a base URL points at a middleware
const PROBE_ENDPOINT: &str = "/entity.json";

/// Suffix tried when the configured base URL does not answer
const MIDDLEWARE_SUFFIX: &str = "/middleware.php";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Middleware base URL
    pub url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Log raw response bodies at debug level
    pub verbose: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "https://demo.volkszaehler.org/middleware.php".to_string(),
            timeout: Duration::from_secs(30),
            verbose: false,
        }
    }
}

/// volkszaehler middleware client
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct VolkszaehlerClient {
    base_url: String,
    client: reqwest::Client,
    verbose: bool,
}

impl VolkszaehlerClient {
    /// Create a client for the configured base URL
    pub fn new(config: ClientConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let base_url = config.url.trim_end_matches('/').to_string();
        endpoint_url(&base_url, &[])?;

        Ok(Self {
            base_url,
            client,
            verbose: config.verbose,
        })
    }

    /// Base URL all requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Find the middleware endpoint below the configured base URL
    ///
    /// Tries the base URL first, then the base URL with `/middleware.php`
    /// appended. If neither answers, the configured URL is kept so later
    /// requests keep retrying against it.
    pub async fn detect_endpoint(&mut self) {
        info!(url = %self.base_url, "Validating API endpoint");
        if self.probe(&self.base_url).await {
            info!("API endpoint validated");
            return;
        }

        let detected = format!("{}{}", self.base_url, MIDDLEWARE_SUFFIX);
        info!(url = %detected, "API endpoint not responding, trying middleware path");
        if self.probe(&detected).await {
            info!(url = %detected, "API endpoint detected");
            self.base_url = detected;
            return;
        }

        warn!(
            url = %self.base_url,
            "API endpoint still not responding, will keep using configured URL"
        );
    }

    async fn probe(&self, base: &str) -> bool {
        let url = format!("{}{}", base, PROBE_ENDPOINT);
        match self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "Endpoint probe failed");
                false
            },
        }
    }

    /// GET a middleware endpoint and decode the JSON body
    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, BackendError> {
        let url = endpoint_url(&self.base_url, segments)?;
        let start = Instant::now();

        let resp = self
            .client
            .get(url.as_str())
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        debug!(
            url = %url,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "GET"
        );
        if self.verbose {
            debug!(url = %url, body = %body, "Backend response body");
        }

        if !status.is_success() {
            if let Ok(envelope) = serde_json::from_str::<ExceptionEnvelope>(&body) {
                if let Some(message) = exception_message(&envelope.exception) {
                    return Err(BackendError::Api(message.to_string()));
                }
            }
            return Err(BackendError::Status(status.as_u16()));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Append percent-encoded path segments to the base URL
///
/// Series ids come from dashboard requests; encoding keeps `/`, `?` and
/// `#` inside the id from changing the request path or query.
fn endpoint_url(base: &str, segments: &[&str]) -> Result<Url, BackendError> {
    let mut url =
        Url::parse(base).map_err(|e| BackendError::InvalidUrl(format!("{}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| BackendError::InvalidUrl(format!("{}: cannot be a base", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Build the query parameters of a data request
///
/// When a point budget is given but no group, a group matching the average
/// sample period is requested so the middleware aggregates server-side.
fn data_query(
    from: i64,
    to: i64,
    group: &str,
    options: &str,
    max_points: usize,
) -> Vec<(&'static str, String)> {
    let mut query = vec![("from", (from * 1000).to_string()), ("to", (to * 1000).to_string())];

    let mut group = group.to_string();
    if max_points > 0 {
        query.push(("tuples", max_points.to_string()));
        if group.is_empty() {
            if let Some(bucket) = infer_bucket(to - from, max_points) {
                group = bucket.as_str().to_string();
            }
        }
    }
    if !group.is_empty() {
        query.push(("group", group));
    }
    if !options.is_empty() {
        query.push(("options", options.to_string()));
    }

    query
}

#[async_trait]
impl Backend for VolkszaehlerClient {
    async fn fetch_entities(&self) -> Result<Vec<EntityTree>, BackendError> {
        let resp: EntitiesResponse = self.get(&["entity.json"], &[]).await?;
        if let Some(message) = exception_message(&resp.exception) {
            return Err(BackendError::Api(message.to_string()));
        }
        Ok(resp.entities.into_iter().map(EntityTree::from).collect())
    }

    async fn fetch_series(
        &self,
        id: &str,
        from: i64,
        to: i64,
        group: &str,
        options: &str,
        max_points: usize,
    ) -> Result<Vec<Tuple>, BackendError> {
        let file = format!("{}.json", id);
        let query = data_query(from, to, group, options, max_points);

        let resp: DataResponse = self.get(&["data", file.as_str()], &query).await?;
        if let Some(message) = exception_message(&resp.exception) {
            return Err(BackendError::Api(message.to_string()));
        }
        Ok(resp
            .data
            .map(|data| data.tuples.into_iter().map(|t| t.0).collect())
            .unwrap_or_default())
    }

    async fn fetch_forecast(&self, id: &str, period: &str) -> Result<f32, BackendError> {
        let file = format!("{}.json", id);
        let query = [("period", period.to_string())];

        let resp: PrognosisResponse = self.get(&["prognosis", file.as_str()], &query).await?;
        if let Some(message) = exception_message(&resp.exception) {
            return Err(BackendError::Api(message.to_string()));
        }
        resp.prognosis
            .map(|p| p.consumption)
            .ok_or_else(|| BackendError::Api("response carries no prognosis".to_string()))
    }
}
