//! Separation API client

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use futures::future::join_all;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{
    config::{ClientConfig, TOKEN_PARAM},
    error::{ApiError, Result},
    executor::RequestExecutor,
    poller::{poll_until_done, PollOptions},
    transport::{ApiRequest, HttpTransport, ReqwestTransport},
    types::{Algorithm, CreatedJob, Envelope, JobStatus, QueueInfo, SeparatedFile, StatusResponse},
    upload::SeparationRequest,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const CREATE_PATH: &str = "/api/separation/create";
const STATUS_PATH: &str = "/api/separation/get";
const ALGORITHMS_PATH: &str = "/api/app/algorithms";
const QUEUE_PATH: &str = "/api/app/queue";

struct ClientInner {
    config: ClientConfig,
    executor: RequestExecutor,
}

/// Client for the separation API
///
/// Cheap to clone; clones share configuration and transport.
#[derive(Clone)]
pub struct SeparationClient {
    inner: Arc<ClientInner>,
}

impl SeparationClient {
    /// Create a client using the production transport
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config.user_agent, CONNECT_TIMEOUT)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client from `AUDIOSEP_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Create a client with a custom transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        config.validate()?;
        let executor = RequestExecutor::new(&config, transport)?;

        Ok(Self {
            inner: Arc::new(ClientInner { config, executor }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get the request executor (for calls not covered by this client)
    pub fn executor(&self) -> &RequestExecutor {
        &self.inner.executor
    }

    /// Submit a new separation job
    pub async fn create_separation(&self, request: &SeparationRequest) -> Result<CreatedJob> {
        let form = request.to_form(&self.inner.config.api_token).await?;
        let api_request = ApiRequest::post(CREATE_PATH).multipart(form);

        let envelope: Envelope<CreatedJob> = self.inner.executor.execute_json(&api_request).await?;
        let job = envelope.into_data("create")?;

        if job.hash.is_empty() {
            return Err(ApiError::Decode("Create response has an empty hash".to_string()));
        }

        info!("Created separation job {} (algorithm {})", job.hash, request.algorithm);
        Ok(job)
    }

    /// Fetch the current status of a job
    pub async fn get_status(&self, hash: &str) -> Result<JobStatus> {
        if hash.trim().is_empty() {
            return Err(ApiError::invalid("Job hash is required"));
        }

        let request = ApiRequest::get(STATUS_PATH).query("hash", hash);
        let response: StatusResponse = self.inner.executor.execute_json(&request).await?;
        JobStatus::from_response(hash, response)
    }

    /// Poll a job until it is done
    pub async fn wait_for(&self, hash: &str, options: &PollOptions) -> Result<JobStatus> {
        poll_until_done(hash, options, |id| {
            let id = id.to_string();
            async move { self.get_status(&id).await }
        })
        .await
    }

    /// Submit a job and wait for its result
    pub async fn separate(
        &self,
        request: &SeparationRequest,
        options: &PollOptions,
    ) -> Result<JobStatus> {
        let job = self.create_separation(request).await?;
        self.wait_for(&job.hash, options).await
    }

    /// Run several independent separations concurrently
    ///
    /// Results are in request order; one failure does not affect the others.
    pub async fn separate_batch(
        &self,
        requests: &[SeparationRequest],
        options: &PollOptions,
    ) -> Vec<Result<JobStatus>> {
        join_all(requests.iter().map(|request| self.separate(request, options))).await
    }

    /// List available separation algorithms
    pub async fn list_algorithms(&self) -> Result<Vec<Algorithm>> {
        self.get_payload(ALGORITHMS_PATH).await
    }

    /// Current server queue load
    pub async fn queue_info(&self) -> Result<QueueInfo> {
        self.get_payload(QUEUE_PATH).await
    }

    /// Download a result file into `dest_dir`, returning the written path
    pub async fn download_file(&self, file: &SeparatedFile, dest_dir: &Path) -> Result<PathBuf> {
        let response = self
            .inner
            .executor
            .execute(&ApiRequest::get(file.url.clone()))
            .await?;

        let dest = dest_dir.join(download_name(file)?);

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|source| ApiError::Io {
                path: dest_dir.to_path_buf(),
                source,
            })?;
        tokio::fs::write(&dest, &response.body)
            .await
            .map_err(|source| ApiError::Io {
                path: dest.clone(),
                source,
            })?;

        debug!("Downloaded {} ({} bytes)", dest.display(), response.body.len());
        Ok(dest)
    }

    /// GET an endpoint that answers with either a bare payload or a `{ success, data }` envelope
    async fn get_payload<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = ApiRequest::get(path).query(TOKEN_PARAM, self.inner.config.api_token.as_str());
        let value: serde_json::Value = self.inner.executor.execute_json(&request).await?;

        if value.get("data").is_some() || value.get("success").is_some() {
            let envelope: Envelope<T> = serde_json::from_value(value)?;
            envelope.into_data(path)
        } else {
            Ok(serde_json::from_value(value)?)
        }
    }
}

/// File name for a download, stripped of any directory components
fn download_name(file: &SeparatedFile) -> Result<String> {
    let candidate = file
        .file_name
        .clone()
        .or_else(|| {
            url::Url::parse(&file.url)
                .ok()
                .and_then(|u| u.path_segments()?.last().map(str::to_string))
        })
        .unwrap_or_default();

    Path::new(&candidate)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::invalid(format!("Cannot derive a file name from {}", file.url)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(url: &str, name: Option<&str>) -> SeparatedFile {
        SeparatedFile {
            url: url.to_string(),
            file_name: name.map(str::to_string),
            size: None,
            stem: None,
        }
    }

    #[test]
    fn test_client_requires_token() {
        let result = SeparationClient::new(ClientConfig::default());
        assert!(matches!(result, Err(ApiError::Validation { status: None, .. })));
    }

    #[test]
    fn test_client_creation() {
        let client = SeparationClient::new(ClientConfig::new("token")).unwrap();
        assert_eq!(client.config().api_token, "token");
        assert_eq!(client.executor().policy().max_retries, 3);
    }

    #[test]
    fn test_download_name() {
        assert_eq!(
            download_name(&file("https://cdn.example.com/a/b/vocals.wav", None)).unwrap(),
            "vocals.wav"
        );
        assert_eq!(
            download_name(&file("https://cdn.example.com/x", Some("../../etc/passwd"))).unwrap(),
            "passwd"
        );
        assert!(download_name(&file("https://cdn.example.com/", None)).is_err());
    }

    #[tokio::test]
    async fn test_empty_hash_rejected_without_request() {
        let client = SeparationClient::new(ClientConfig::new("token")).unwrap();
        let result = client.get_status("  ").await;
        assert!(matches!(result, Err(ApiError::Validation { .. })));
    }
}
