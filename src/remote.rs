use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Await a remote call, giving up on cancellation or after `timeout`.
///
/// Cancellation wins over a result that becomes ready in the same poll so a
/// closed flow never acts on a late response.
pub(crate) async fn guarded<T, F>(
    cancel: &CancellationToken,
    timeout: Duration,
    label: &str,
    call: F,
) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = tokio::time::timeout(timeout, call) => match res {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(label.to_string())),
        },
    }
}

/// Sleep unless cancelled first
pub(crate) async fn pause(cancel: &CancellationToken, delay: Duration) -> Result<(), Error> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
