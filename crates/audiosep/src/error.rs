//! Error taxonomy for API operations
//!
//! Every failure the client can surface is a variant of [`ApiError`]. The request
//! executor is the only place that turns raw transport or HTTP outcomes into these
//! variants; everything above it matches on the variant instead of on status codes.

use std::{collections::HashMap, path::PathBuf, time::Duration};

use reqwest::{header::HeaderMap, StatusCode};
use thiserror::Error;

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// Boxed transport-level cause
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Field name -> messages, as reported by the server for 400/422 responses
pub type FieldErrors = HashMap<String, Vec<String>>;

/// Body of a non-2xx response, parsed according to its content type
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
    Empty,
}

impl ResponseBody {
    /// Parse raw bytes using the response content type
    pub fn parse(content_type: Option<&str>, bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return ResponseBody::Empty;
        }

        let is_json = content_type
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);

        if is_json {
            if let Ok(value) = serde_json::from_slice(bytes) {
                return ResponseBody::Json(value);
            }
        }

        ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Best-effort human readable message from the body
    pub fn message(&self) -> Option<String> {
        match self {
            ResponseBody::Json(value) => ["message", "error", "detail"]
                .iter()
                .find_map(|key| value.get(key).and_then(|v| v.as_str()))
                .map(str::to_string),
            ResponseBody::Text(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        }
    }
}

/// API client errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connection refused, DNS, reset)
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// An attempt or a poll session exceeded its allotted duration
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP 429
    #[error("Rate limited (HTTP {status}){}", retry_after_suffix(.retry_after))]
    RateLimit {
        status: StatusCode,
        retry_after: Option<Duration>,
        body: ResponseBody,
        headers: HeaderMap,
    },

    /// HTTP 401/403
    #[error("Authentication failed (HTTP {status}): {message}")]
    Authentication {
        status: StatusCode,
        message: String,
        body: ResponseBody,
    },

    /// HTTP 400/422, or invalid client configuration (no status)
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        status: Option<StatusCode>,
        field_errors: Option<FieldErrors>,
        body: ResponseBody,
    },

    /// Any other non-2xx status
    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: StatusCode,
        message: String,
        body: ResponseBody,
        headers: HeaderMap,
    },

    /// Local upload file could not be read
    #[error("Failed to read upload file {}: {message}", .path.display())]
    FileUpload { path: PathBuf, message: String },

    /// Writing a downloaded result file failed
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Separation job reached the failed state
    #[error("Separation job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    /// Poll session cancelled by the caller
    #[error("Polling for job {job_id} was cancelled")]
    Cancelled { job_id: String },

    /// A successful response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

fn retry_after_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(delay) => format!(", retry after {delay:?}"),
        None => String::new(),
    }
}

impl ApiError {
    /// Build a network error from any transport cause
    pub fn network(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        ApiError::Network {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Validation error raised locally (no HTTP status)
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            status: None,
            field_errors: None,
            body: ResponseBody::Empty,
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::RateLimit { status, .. }
            | ApiError::Authentication { status, .. }
            | ApiError::Api { status, .. } => Some(*status),
            ApiError::Validation { status, .. } => *status,
            _ => None,
        }
    }

    /// Server-provided retry hint
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Response headers, when the error came from an HTTP response
    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            ApiError::RateLimit { headers, .. } | ApiError::Api { headers, .. } => Some(headers),
            _ => None,
        }
    }

    /// Parsed body of the non-2xx response this error was built from
    pub fn body(&self) -> Option<&ResponseBody> {
        match self {
            ApiError::RateLimit { body, .. }
            | ApiError::Authentication { body, .. }
            | ApiError::Api { body, .. } => Some(body),
            ApiError::Validation {
                status: Some(_),
                body,
                ..
            } => Some(body),
            _ => None,
        }
    }

    /// True for every error produced from a non-2xx HTTP response
    pub fn is_api_error(&self) -> bool {
        self.status().is_some()
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        crate::retry::is_retryable(self)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs can carry the API token in their query
        ApiError::network(err.without_url())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_parse_json_by_content_type() {
        let body = ResponseBody::parse(Some("application/json; charset=utf-8"), br#"{"a":1}"#);
        assert_eq!(body.as_json().and_then(|v| v.get("a")).and_then(|v| v.as_i64()), Some(1));
    }

    #[test]
    fn test_body_parse_text_fallback() {
        let body = ResponseBody::parse(Some("text/html"), b"<h1>Bad Gateway</h1>");
        assert_eq!(body, ResponseBody::Text("<h1>Bad Gateway</h1>".to_string()));

        // Malformed JSON is kept as text
        let body = ResponseBody::parse(Some("application/json"), b"{oops");
        assert!(matches!(body, ResponseBody::Text(_)));

        assert_eq!(ResponseBody::parse(None, b""), ResponseBody::Empty);
    }

    #[test]
    fn test_body_message() {
        let body = ResponseBody::Json(serde_json::json!({ "message": "Invalid api token" }));
        assert_eq!(body.message().as_deref(), Some("Invalid api token"));
        assert_eq!(ResponseBody::Empty.message(), None);
    }

    #[test]
    fn test_is_api_error() {
        let api = ApiError::Api {
            status: StatusCode::NOT_FOUND,
            message: "missing".to_string(),
            body: ResponseBody::Empty,
            headers: HeaderMap::new(),
        };
        assert!(api.is_api_error());
        assert_eq!(api.status(), Some(StatusCode::NOT_FOUND));

        assert!(!ApiError::invalid("api token is required").is_api_error());
        assert!(!ApiError::Timeout(Duration::from_secs(1)).is_api_error());
    }

    #[test]
    fn test_rate_limit_message_includes_retry_after() {
        let err = ApiError::RateLimit {
            status: StatusCode::TOO_MANY_REQUESTS,
            retry_after: Some(Duration::from_secs(5)),
            body: ResponseBody::Empty,
            headers: HeaderMap::new(),
        };
        assert!(err.to_string().contains("retry after 5s"));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_body_only_for_http_errors() {
        let err = ApiError::Authentication {
            status: StatusCode::FORBIDDEN,
            message: "Token revoked".to_string(),
            body: ResponseBody::Text("Token revoked".to_string()),
        };
        assert_eq!(err.body(), Some(&ResponseBody::Text("Token revoked".to_string())));

        assert_eq!(ApiError::invalid("api token is required").body(), None);
        assert_eq!(ApiError::network("reset").body(), None);
    }
}
