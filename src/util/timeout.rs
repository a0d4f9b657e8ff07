//! Optional deadline helper.

use std::future::Future;
use std::time::Duration;

use crate::error::ParleyError;

/// Await `future`, failing with [`ParleyError::Timeout`] once `limit` elapses.
///
/// A `None` limit awaits indefinitely.
pub async fn with_timeout<T>(
    limit: Option<Duration>,
    future: impl Future<Output = Result<T, ParleyError>>,
) -> Result<T, ParleyError> {
    let Some(duration) = limit else {
        return future.await;
    };
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ParleyError::Timeout(duration.as_millis() as u64)),
    }
}
