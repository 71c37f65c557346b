use crate::error::Result;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// Looks up a direct download URL for a file hosted behind a third-party API.
/// Allows the repository to stay independent of any particular host.
pub trait DownloadUrlResolver: Send + Sync {
    /// Resolve a (project id, file id) pair to a direct, possibly short-lived URL.
    fn resolve_download_url<'a>(
        &'a self,
        project_id: u32,
        file_id: u32,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String>>;
}
