//! HTTP transport seam
//!
//! The executor never talks to `reqwest` directly; it hands a fully resolved
//! [`PreparedRequest`] to an [`HttpTransport`]. Production code uses
//! [`ReqwestTransport`], tests can inject their own implementation per client.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, CONTENT_TYPE},
    multipart, Method, StatusCode,
};
use url::Url;

use crate::error::{ApiError, Result};

/// One part of a multipart form
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: String,
        data: Arc<Vec<u8>>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

/// Request body, kept cloneable so every retry sends identical bytes
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Multipart(Vec<FormPart>),
}

/// Description of one logical API call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, or an absolute URL
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }
}

/// A request with its URL resolved and headers merged, ready to send
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// Fully buffered HTTP response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// Mockable HTTP transport
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send one physical request and buffer the full response
    ///
    /// Non-2xx statuses are returned as `Ok`; only transport failures are errors.
    async fn send(&self, request: PreparedRequest) -> Result<RawResponse>;
}

/// Production transport backed by `reqwest`
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport; the per-attempt deadline is enforced by the executor
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ApiError::invalid(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { inner })
    }

    /// Wrap an existing reqwest client
    pub fn from_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    /// Get underlying reqwest client (for advanced usage)
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }
}

fn build_form(parts: Vec<FormPart>) -> Result<multipart::Form> {
    let mut form = multipart::Form::new();

    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name, value),
            FormPart::File {
                name,
                file_name,
                mime,
                data,
            } => {
                let part = multipart::Part::bytes(data.as_ref().clone())
                    .file_name(file_name)
                    .mime_str(&mime)
                    .map_err(|e| ApiError::invalid(format!("Invalid MIME type '{mime}': {e}")))?;
                form.part(name, part)
            }
        };
    }

    Ok(form)
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: PreparedRequest) -> Result<RawResponse> {
        let mut builder = self
            .inner
            .request(request.method, request.url)
            .headers(request.headers);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
