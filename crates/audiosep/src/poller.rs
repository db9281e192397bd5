//! Job status polling
//!
//! [`poll_until_done`] repeatedly fetches a job's status until it reaches a terminal
//! state, the session deadline passes or the caller cancels. Each session is owned by
//! one call; nothing is shared between concurrent sessions.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::{ApiError, Result},
    types::{JobState, JobStatus},
};

/// Progress callback invoked with every non-terminal snapshot
///
/// Errors are logged and polling continues.
pub type ProgressCallback = Arc<dyn Fn(&JobStatus) -> anyhow::Result<()> + Send + Sync>;

/// Polling options
#[derive(Clone)]
pub struct PollOptions {
    /// Delay between status fetches
    pub interval: Duration,
    /// Give up once this much time has passed since the session started
    pub max_duration: Duration,
    pub on_progress: Option<ProgressCallback>,
    /// Stops the session early when cancelled
    pub cancel: Option<CancellationToken>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_duration: Duration::from_secs(30 * 60),
            on_progress: None,
            cancel: None,
        }
    }
}

impl fmt::Debug for PollOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollOptions")
            .field("interval", &self.interval)
            .field("max_duration", &self.max_duration)
            .field("on_progress", &self.on_progress.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

impl PollOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Set the progress callback
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&JobStatus) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

struct PollSession<'a> {
    job_id: &'a str,
    started: Instant,
    options: &'a PollOptions,
    polls: u32,
}

impl PollSession<'_> {
    fn is_cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn report(&self, status: &JobStatus) {
        if let Some(callback) = &self.options.on_progress {
            if let Err(e) = callback(status) {
                warn!("Progress callback failed for job {}: {e:#}", self.job_id);
            }
        }
    }

    async fn wait(&self) {
        match &self.options.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(self.options.interval) => {}
                }
            }
            None => tokio::time::sleep(self.options.interval).await,
        }
    }
}

/// Poll `fetch` until the job is done
///
/// Returns the `done` snapshot. Fails with [`ApiError::JobFailed`] when the job fails,
/// [`ApiError::Timeout`] when `max_duration` elapses before a poll and
/// [`ApiError::Cancelled`] when the cancellation token fires. Errors from `fetch` itself
/// are returned as-is; it is expected to do its own retrying.
pub async fn poll_until_done<F, Fut>(
    job_id: &str,
    options: &PollOptions,
    mut fetch: F,
) -> Result<JobStatus>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<JobStatus>>,
{
    let mut session = PollSession {
        job_id,
        started: Instant::now(),
        options,
        polls: 0,
    };

    loop {
        if session.is_cancelled() {
            return Err(ApiError::Cancelled {
                job_id: job_id.to_string(),
            });
        }

        if session.started.elapsed() >= options.max_duration {
            debug!("Job {job_id} still running after {} polls", session.polls);
            return Err(ApiError::Timeout(options.max_duration));
        }

        let status = fetch(job_id).await?;
        session.polls += 1;

        match status.state {
            JobState::Done => {
                debug!("Job {job_id} done after {} polls", session.polls);
                return Ok(status);
            }
            JobState::Failed => {
                return Err(ApiError::JobFailed {
                    job_id: job_id.to_string(),
                    message: status
                        .message
                        .unwrap_or_else(|| "no details provided".to_string()),
                });
            }
            JobState::Pending | JobState::Running => {
                debug!(
                    "Job {job_id} is {:?} (queue position {:?})",
                    status.state, status.queue_position
                );
                session.report(&status);
                session.wait().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn snapshot(state: JobState) -> JobStatus {
        JobStatus {
            hash: "job-1".to_string(),
            state,
            queue_position: None,
            message: None,
            files: Vec::new(),
            data: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_error_does_not_stop_polling() {
        let states = Mutex::new(vec![JobState::Done, JobState::Running]);
        let options = PollOptions::new()
            .with_interval(Duration::from_millis(10))
            .on_progress(|_| Err(anyhow::anyhow!("ui closed")));

        let result = poll_until_done("job-1", &options, |_| {
            let next = states.lock().unwrap().pop().unwrap();
            async move { Ok(snapshot(next)) }
        })
        .await;

        assert_eq!(result.unwrap().state, JobState::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_propagates() {
        let options = PollOptions::new();
        let result = poll_until_done("job-1", &options, |_| async {
            Err(ApiError::network("connection reset"))
        })
        .await;

        assert!(matches!(result, Err(ApiError::Network { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_never_polls() {
        let options = PollOptions::new().with_max_duration(Duration::ZERO);
        let mut polls = 0;

        let result = poll_until_done("job-1", &options, |_| {
            polls += 1;
            async { Ok(snapshot(JobState::Done)) }
        })
        .await;

        assert!(matches!(result, Err(ApiError::Timeout(_))));
        assert_eq!(polls, 0);
    }

    #[test]
    fn test_default_options() {
        let options = PollOptions::default();
        assert_eq!(options.interval, Duration::from_secs(5));
        assert_eq!(options.max_duration, Duration::from_secs(1800));
        assert!(options.on_progress.is_none());
        assert!(format!("{options:?}").contains("on_progress: false"));
    }
}
