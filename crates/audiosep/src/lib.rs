//! Client SDK for the audio separation web API
//!
//! Uploads audio, creates separation jobs and polls them until the stems are ready.
//!
//! ## Features
//!
//! - **Typed errors**: one [`ApiError`] enum covering transport, HTTP and job failures
//! - **Retries**: exponential backoff capped at 32s, honouring `Retry-After`
//! - **Per-attempt timeouts**: each physical request races its own deadline
//! - **Polling**: progress callbacks, overall deadline and optional cancellation
//! - **Testing support**: inject an [`HttpTransport`] per client, or mock with wiremock
//!
//! ```no_run
//! use audiosep::{AudioSource, ClientConfig, PollOptions, SeparationClient, SeparationRequest};
//!
//! # async fn run() -> audiosep::Result<()> {
//! let client = SeparationClient::new(ClientConfig::new("my-token"))?;
//! let request = SeparationRequest::new(AudioSource::path("song.mp3"), 40);
//! let options = PollOptions::new().on_progress(|status| {
//!     println!("{:?} (queue position {:?})", status.state, status.queue_position);
//!     Ok(())
//! });
//!
//! let result = client.separate(&request, &options).await?;
//! for file in &result.files {
//!     client.download_file(file, std::path::Path::new("stems")).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod poller;
pub mod retry;
pub mod timeout;
pub mod transport;
pub mod types;
pub mod upload;

pub use client::SeparationClient;
pub use config::ClientConfig;
pub use error::{ApiError, FieldErrors, ResponseBody, Result};
pub use executor::{ApiResponse, RequestExecutor};
pub use poller::{poll_until_done, PollOptions, ProgressCallback};
pub use retry::{calculate_backoff, delay_for, is_retryable, parse_retry_after, RetryPolicy};
pub use timeout::with_timeout;
pub use transport::{
    ApiRequest, FormPart, HttpTransport, PreparedRequest, RawResponse, RequestBody,
    ReqwestTransport,
};
pub use types::{Algorithm, CreatedJob, JobState, JobStatus, QueueInfo, SeparatedFile};
pub use upload::{AudioSource, SeparationRequest};

/// Re-export commonly used types
pub use reqwest::{header, Method, StatusCode};
pub use tokio_util::sync::CancellationToken;
