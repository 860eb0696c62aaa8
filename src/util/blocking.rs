//! Run blocking filesystem work off the async runtime.

use tokio::task::spawn_blocking;

use crate::core::StoreError;

/// Run `f` on the blocking pool. A panicked or cancelled job is an I/O error.
pub async fn blocking<F, T>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?
}
