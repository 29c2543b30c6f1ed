use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::AppError;

/// Runs one store call under `limit`. An elapsed deadline becomes `AppError::Timeout`.
pub async fn within<T, F>(limit: Duration, operation: &str, call: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = limit.as_millis() as u64, "Store call timed out");
            Err(AppError::Timeout(format!("{} exceeded {}ms", operation, limit.as_millis())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_calls_time_out() {
        let result: Result<(), AppError> = within(Duration::from_millis(10), "jobs.find_by_id", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AppError::Timeout(msg)) if msg.starts_with("jobs.find_by_id")));
    }

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let result = within(Duration::from_millis(100), "noop", async { Ok::<_, AppError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
