//! Request executor
//!
//! Issues one logical API call: resolves the URL, merges default headers, sends the
//! request through the transport under the per-attempt deadline and classifies the
//! outcome. Retryable failures are retried according to the [`RetryPolicy`].

use std::sync::Arc;

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER},
    StatusCode,
};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::{
    config::{ClientConfig, TOKEN_PARAM},
    error::{ApiError, FieldErrors, ResponseBody, Result},
    retry::{parse_retry_after, RetryPolicy},
    transport::{ApiRequest, HttpTransport, PreparedRequest, RawResponse},
};

const MAX_MESSAGE_LEN: usize = 512;

/// Successful (2xx) response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes API requests with per-attempt timeouts and retries
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    default_headers: HeaderMap,
    policy: RetryPolicy,
    debug: bool,
}

impl RequestExecutor {
    /// Create an executor from client configuration and a transport
    pub fn new(config: &ClientConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        Url::parse(&config.base_url)
            .map_err(|e| ApiError::invalid(format!("Invalid base URL '{}': {e}", config.base_url)))?;

        let mut default_headers = HeaderMap::new();
        for (name, value) in &config.custom_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::invalid(format!("Invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ApiError::invalid(format!("Invalid value for header {name}: {e}")))?;
            default_headers.insert(name, value);
        }

        Ok(Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_headers,
            policy: RetryPolicy::new(config.max_retries, config.retry_delay, config.timeout)
                .with_max_delay(config.max_retry_delay),
            debug: config.debug,
        })
    }

    /// Get the retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Resolve a request path against the base URL and append its query
    pub fn resolve_url(&self, request: &ApiRequest) -> Result<Url> {
        let raw = if request.path.starts_with("http://") || request.path.starts_with("https://") {
            request.path.clone()
        } else {
            format!("{}/{}", self.base_url, request.path.trim_start_matches('/'))
        };

        let mut url = Url::parse(&raw)
            .map_err(|e| ApiError::invalid(format!("Invalid URL '{raw}': {e}")))?;

        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        Ok(url)
    }

    fn prepare(&self, request: &ApiRequest) -> Result<PreparedRequest> {
        let mut headers = self.default_headers.clone();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::invalid(format!("Invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ApiError::invalid(format!("Invalid value for header {name}: {e}")))?;
            headers.insert(name, value);
        }

        Ok(PreparedRequest {
            method: request.method.clone(),
            url: self.resolve_url(request)?,
            headers,
            body: request.body.clone(),
        })
    }

    /// Execute a request, retrying transient failures
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let prepared = self.prepare(request)?;
        self.policy.run(|| self.attempt(prepared.clone())).await
    }

    /// Execute a request and decode the JSON body
    pub async fn execute_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        self.execute(request).await?.json()
    }

    async fn attempt(&self, request: PreparedRequest) -> Result<ApiResponse> {
        if self.debug {
            debug!("{} {}", request.method, redacted(&request.url));
        }

        let raw = self.transport.send(request).await?;

        if self.debug {
            debug!(
                "Response {}: {}",
                raw.status,
                String::from_utf8_lossy(&raw.body)
            );
        }

        classify_response(raw)
    }
}

/// Map a buffered response onto success or the error taxonomy
pub fn classify_response(raw: RawResponse) -> Result<ApiResponse> {
    let status = raw.status;

    if status.is_success() {
        return Ok(ApiResponse {
            status,
            headers: raw.headers,
            body: raw.body,
        });
    }

    let body = ResponseBody::parse(raw.content_type(), &raw.body);
    let message = body
        .message()
        .map(|m| truncate(&m))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    Err(match status.as_u16() {
        429 => {
            let retry_after = parse_retry_after(
                raw.headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok()),
            );
            ApiError::RateLimit {
                status,
                retry_after: (!retry_after.is_zero()).then_some(retry_after),
                body,
                headers: raw.headers,
            }
        }
        401 | 403 => ApiError::Authentication {
            status,
            message,
            body,
        },
        400 | 422 => ApiError::Validation {
            message,
            status: Some(status),
            field_errors: field_errors(&body),
            body,
        },
        _ => ApiError::Api {
            status,
            message,
            body,
            headers: raw.headers,
        },
    })
}

/// Extract `{"errors": {"field": "msg" | ["msg", ...]}}`
fn field_errors(body: &ResponseBody) -> Option<FieldErrors> {
    let errors = body.as_json()?.get("errors")?.as_object()?;

    let parsed: FieldErrors = errors
        .iter()
        .map(|(field, value)| {
            let messages = match value {
                serde_json::Value::String(s) => vec![s.clone()],
                serde_json::Value::Array(items) => items
                    .iter()
                    .map(|item| item.as_str().map_or_else(|| item.to_string(), str::to_string))
                    .collect(),
                other => vec![other.to_string()],
            };
            (field.clone(), messages)
        })
        .collect();

    (!parsed.is_empty()).then_some(parsed)
}

/// URL for log lines, with the API token masked
fn redacted(url: &Url) -> String {
    if !url.query_pairs().any(|(name, _)| name == TOKEN_PARAM) {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| {
            let value = if name == TOKEN_PARAM {
                "redacted".to_string()
            } else {
                value.into_owned()
            };
            (name.into_owned(), value)
        })
        .collect();

    let mut masked = url.clone();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

fn truncate(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_LEN {
        message.to_string()
    } else {
        let mut cut: String = message.chars().take(MAX_MESSAGE_LEN).collect();
        cut.push('…');
        cut
    }
}
