//! Cooperative cancellation of external calls

use super::EngineError;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Run `future` unless `cancel` fires first
///
/// # Errors
///
/// Returns [`EngineError::Cancelled`] when the token is (or becomes)
/// cancelled, otherwise the future's own error converted into an
/// [`EngineError`].
pub async fn run_cancellable<F, T, E>(cancel: &CancellationToken, future: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<EngineError>,
{
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(EngineError::Cancelled),
        result = future => result.map_err(Into::into),
    }
}
