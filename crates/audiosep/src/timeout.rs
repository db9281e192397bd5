//! Deadline wrapper for single attempts

use std::{future::Future, time::Duration};

use crate::error::{ApiError, Result};

/// Run `operation`, failing with [`ApiError::Timeout`] if it does not finish within `limit`
///
/// The timer is owned by the returned future and dropped with it, so nothing is left
/// pending whichever side wins.
pub async fn with_timeout<F, T>(limit: Duration, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completes_before_deadline() {
        let result = with_timeout(Duration::from_secs(1), async { Ok::<_, ApiError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let result = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, ApiError>(())
        })
        .await;

        assert!(matches!(result, Err(ApiError::Timeout(d)) if d == Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_error_passes_through() {
        let result: Result<()> = with_timeout(Duration::from_secs(1), async {
            Err(ApiError::invalid("bad"))
        })
        .await;

        assert!(matches!(result, Err(ApiError::Validation { .. })));
    }
}
