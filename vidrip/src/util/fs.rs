use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

/**
    Delete an intermediate file. A file that is already gone is fine.

    Failures are logged and otherwise ignored: a leftover intermediate never
    makes a finished step fail.
*/
pub async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed intermediate"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove intermediate"),
    }
}

/**
    Move a finished staging file into place.

    Returns `false` when the staging file does not exist.
*/
pub async fn promote(staging: &Path, target: &Path) -> std::io::Result<bool> {
    match tokio::fs::rename(staging, target).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
