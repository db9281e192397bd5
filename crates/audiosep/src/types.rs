//! API payload types

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ApiError, Result};

/// Lifecycle state of a separation job as observed by polling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting in the server queue
    Pending,
    /// Being processed
    Running,
    /// Finished; result files are available
    Done,
    /// Finished with an error
    Failed,
}

impl JobState {
    /// Map the server's status string
    pub fn from_api(status: &str) -> Self {
        match status {
            "waiting" | "pending" | "queued" => JobState::Pending,
            "processing" | "distributing" | "merging" | "running" => JobState::Running,
            "done" => JobState::Done,
            "failed" | "not_found" | "error" => JobState::Failed,
            other => {
                warn!("Unknown job status '{other}', treating as running");
                JobState::Running
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

/// One output file of a finished job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparatedFile {
    /// Download URL
    pub url: String,
    /// Suggested file name
    #[serde(default, rename = "download")]
    pub file_name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Stem label, e.g. "Vocals"
    #[serde(default, rename = "type")]
    pub stem: Option<String>,
}

/// Snapshot of a remote job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub hash: String,
    pub state: JobState,
    /// Jobs ahead of this one, while pending
    pub queue_position: Option<u64>,
    pub message: Option<String>,
    pub files: Vec<SeparatedFile>,
    /// Raw `data` payload as returned by the server
    pub data: Option<serde_json::Value>,
}

/// Wire shape of `GET /api/separation/get`
#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    #[serde(default)]
    pub success: bool,
    pub status: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl JobStatus {
    pub(crate) fn from_response(hash: &str, response: StatusResponse) -> Result<Self> {
        let state = JobState::from_api(&response.status);
        let data = response.data;

        let field = |key: &str| data.as_ref().and_then(|d| d.get(key));

        let queue_position = field("current_order")
            .or_else(|| field("queue_count"))
            .and_then(|v| v.as_u64());
        let message = field("message").and_then(|v| v.as_str()).map(str::to_string);
        let files = match field("files") {
            Some(files) => serde_json::from_value(files.clone())?,
            None => Vec::new(),
        };

        if !response.success && state != JobState::Failed {
            warn!("Status response for {hash} has success=false with state {state:?}");
        }

        Ok(Self {
            hash: hash.to_string(),
            state,
            queue_position,
            message,
            files,
            data,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Handle returned when a job is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedJob {
    pub hash: String,
    /// Web page for the job, when provided
    #[serde(default)]
    pub link: Option<String>,
}

/// Separation algorithm offered by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Algorithm {
    #[serde(alias = "render_id")]
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Extra options accepted by the algorithm (`add_opt1`, `add_opt2`)
    #[serde(default)]
    pub additional_fields: Option<serde_json::Value>,
}

/// Server queue load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueInfo {
    #[serde(default, alias = "queue")]
    pub queue_length: Option<u64>,
    #[serde(default)]
    pub active_jobs: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Common `{ success, data }` envelope
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl<T> Envelope<T> {
    /// Unwrap the payload, turning `success: false` into a validation error
    pub fn into_data(self, what: &str) -> Result<T> {
        if !self.success {
            return Err(ApiError::invalid(
                self.message
                    .unwrap_or_else(|| format!("Server rejected {what} request")),
            ));
        }

        self.data
            .ok_or_else(|| ApiError::Decode(format!("Missing data in {what} response")))
    }
}
