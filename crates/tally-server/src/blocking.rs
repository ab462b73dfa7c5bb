//! Running CPU-heavy domain work off the async executor.

use tally_core::Error;

use crate::error::ApiResult;

/// Run `work` on the blocking pool. Callers must not hold the database
/// lock across this await.
pub async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> tally_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Internal(format!("blocking task failed: {e}")))?;
    Ok(result?)
}
