use crate::{CodescopeError, Result};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Race a suspension point against its cancellation token.
///
/// The two suspension points in the system are store I/O and embedder
/// inference; every call site wraps them with this helper so a cancellation
/// signal aborts at the next await rather than after it.
pub async fn cancellable<F, T>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(CodescopeError::Cancelled),
        result = fut => result,
    }
}
