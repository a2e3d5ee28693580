//! Plumbing shared by every client: the per-call deadline and call tracing.

use std::future::Future;
use std::time::Duration;

use admintools_core::error::CallError;

/// Runs one remote call under `limit`.
///
/// An expired deadline is reported as a transport failure of `operation`. The
/// remote side may still complete the request; nothing is retried.
pub async fn bounded<T, F>(limit: Duration, operation: &str, call: F) -> Result<T, CallError>
where
    F: Future<Output = Result<T, CallError>>,
{
    log::debug!("calling {operation}");
    let outcome = match tokio::time::timeout(limit, call).await {
        Ok(outcome) => outcome,
        Err(_) => Err(CallError::transport(
            operation,
            format!("timed out after {}s", limit.as_secs()),
        )),
    };

    if let Err(e) = &outcome {
        log::debug!("{operation} failed: {e}");
    }
    outcome
}

/// Reads an environment variable, treating empty values as unset.
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let value = bounded(Duration::from_secs(1), "op", async { Ok::<_, CallError>(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out_as_transport_error() {
        let err = bounded(Duration::from_secs(5), "getTotalUsers", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, CallError>(())
        })
        .await
        .unwrap_err();

        assert_eq!(
            err,
            CallError::transport("getTotalUsers", "timed out after 5s")
        );
    }
}
