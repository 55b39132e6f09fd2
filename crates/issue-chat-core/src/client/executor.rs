//! Single authenticated HTTP calls against the GitHub API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::credentials::Credential;
use crate::error::ApiError;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Fallback wait in seconds when a rate-limited response lacks a usable reset header.
const DEFAULT_RATE_LIMIT_WAIT_SECS: i64 = 60;

/// Error body GitHub returns with non-success responses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    documentation_url: Option<String>,
}

/// Envelope of a GraphQL response.
#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphQlErrorEntry>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorEntry {
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: &'a Value,
}

/// Performs authenticated requests and normalizes success and failure shapes.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    http_client: reqwest::Client,
    api_url: String,
    graphql_url: String,
}

impl RequestExecutor {
    /// Create an executor for the given REST and GraphQL endpoints.
    pub fn new(
        api_url: &str,
        graphql_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            graphql_url: graphql_url.to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn graphql_url(&self) -> &str {
        &self.graphql_url
    }

    /// Execute a REST call.
    ///
    /// `path` is relative to the API base URL and may carry a query string.
    /// Returns `None` when the response has no body (204 or empty).
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&Credential>,
    ) -> Result<Option<Value>, ApiError> {
        let path = if method == Method::GET {
            with_cache_buster(path, Utc::now().timestamp_millis())
        } else {
            path.to_string()
        };
        let url = format!("{}{}", self.api_url, path);

        let response = self.send(method, &url, body, token).await?;
        read_json_body(response).await
    }

    /// GET and deserialize the response body.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&Credential>,
    ) -> Result<T, ApiError> {
        let value = self.execute(Method::GET, path, None, token).await?;
        decode(value)
    }

    /// POST a JSON body and deserialize the response body.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: Option<&Credential>,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        let value = self.execute(Method::POST, path, Some(&body), token).await?;
        decode(value)
    }

    /// PATCH a JSON body and deserialize the response body.
    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: Option<&Credential>,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        let value = self.execute(Method::PATCH, path, Some(&body), token).await?;
        decode(value)
    }

    /// DELETE a resource; any response body is discarded.
    pub async fn delete(&self, path: &str, token: Option<&Credential>) -> Result<(), ApiError> {
        self.execute(Method::DELETE, path, None, token).await?;
        Ok(())
    }

    /// POST a GraphQL query and return its `data` member.
    ///
    /// GraphQL reports failures inside a 200 body, so a non-empty top-level
    /// `errors` list is an error here even when the HTTP call succeeded.
    #[instrument(skip_all)]
    pub async fn graphql(
        &self,
        query: &str,
        variables: &Value,
        token: Option<&Credential>,
    ) -> Result<Value, ApiError> {
        let request = serde_json::to_value(GraphQlRequest { query, variables })?;
        let response = self
            .send(Method::POST, &self.graphql_url, Some(&request), token)
            .await?;

        let body = read_json_body(response).await?.ok_or_else(|| ApiError::GraphQl {
            message: "Empty GraphQL response".to_string(),
            not_found: false,
        })?;
        let envelope: GraphQlEnvelope = serde_json::from_value(body)?;

        if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
            let not_found = errors
                .iter()
                .any(|e| e.kind.as_deref() == Some("NOT_FOUND"));
            let message = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ApiError::GraphQl { message, not_found });
        }

        envelope.data.ok_or_else(|| ApiError::GraphQl {
            message: "GraphQL response carried no data".to_string(),
            not_found: false,
        })
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        token: Option<&Credential>,
    ) -> Result<Response, ApiError> {
        debug!(method = %method, url = %url, "Sending GitHub API request");

        let mut request = self
            .http_client
            .request(method, url)
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);

        if let Some(token) = token.filter(|t| !t.is_blank()) {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token.expose()));
        }

        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        let response = request.send().await.map_err(ApiError::from)?;
        let status = response.status();

        if status.is_success() {
            debug!(status = status.as_u16(), "GitHub API request succeeded");
            return Ok(response);
        }

        Err(error_from_response(response).await)
    }
}

/// Append the `_t=<millis>` cache-busting parameter.
pub(crate) fn with_cache_buster(path: &str, millis: i64) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}_t={}", path, separator, millis)
}

/// Build `path?k=v&...`, percent-encoding values. Empty pairs yield the bare path.
pub(crate) fn with_query(path: &str, pairs: &[(&str, String)]) -> String {
    if pairs.is_empty() {
        return path.to_string();
    }

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())))
        .finish();
    format!("{}?{}", path, query)
}

async fn read_json_body(response: Response) -> Result<Option<Value>, ApiError> {
    if response.status() == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let text = response.text().await.map_err(ApiError::from)?;
    if text.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(serde_json::from_str(&text)?))
}

fn decode<T: DeserializeOwned>(value: Option<Value>) -> Result<T, ApiError> {
    let value = value.ok_or_else(|| ApiError::Json {
        message: "Expected a response body but none was returned".to_string(),
    })?;
    Ok(serde_json::from_value(value)?)
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    let headers = response.headers().clone();

    if matches!(status.as_u16(), 403 | 429) {
        if let Some(reset_at) = rate_limit_reset(&headers) {
            return ApiError::RateLimitExceeded {
                status: status.as_u16(),
                reset_at,
            };
        }
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();

    let message = body.message.unwrap_or_else(|| {
        format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        )
    });

    ApiError::HttpError {
        status: status.as_u16(),
        message,
        documentation_url: body.documentation_url,
    }
}

/// Reset time when the headers report an exhausted quota.
fn rate_limit_reset(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let remaining = headers
        .get("x-ratelimit-remaining")?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()?;
    if remaining != 0 {
        return None;
    }

    let reset_at = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(DEFAULT_RATE_LIMIT_WAIT_SECS));
    Some(reset_at)
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
