use crate::error::{PackError, Result};
use futures::stream::{self, StreamExt};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Run `task` for every item with at most `width` in flight.
///
/// Members share a child of `cancel`. The first failure cancels that child,
/// drops every in-flight member and is returned as-is; later errors are
/// discarded. Items not yet started never start. On success the outputs are
/// returned in completion order.
pub async fn run_bounded<I, T, F, Fut>(
    items: I,
    width: usize,
    cancel: &CancellationToken,
    mut task: F,
) -> Result<Vec<T>>
where
    I: IntoIterator,
    F: FnMut(I::Item, CancellationToken) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let group = cancel.child_token();

    let mut results = stream::iter(items)
        .map(|item| {
            let token = group.clone();
            let fut = task(item, token.clone());
            async move {
                if token.is_cancelled() {
                    return Err(PackError::Cancelled);
                }
                fut.await
            }
        })
        .buffer_unordered(width.max(1));

    let mut outputs = Vec::new();
    while let Some(result) = results.next().await {
        match result {
            Ok(output) => outputs.push(output),
            Err(e) => {
                group.cancel();
                log::debug!("Batch member failed, cancelling siblings: {}", e);
                return Err(e);
            }
        }
    }

    Ok(outputs)
}
