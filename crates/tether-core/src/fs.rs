//! Filesystem helpers.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Canonicalisation of a path failed.
#[derive(Error, Debug)]
#[error("An error in realpath occurred: {message} (Error code {code}) for {}", .path.display())]
pub struct RealpathError
{
    /// OS error code, `-1` if the platform did not report one
    pub code: i32,
    /// Human-readable description of the failure
    pub message: String,
    /// The path that could not be resolved
    pub path: PathBuf,
}

impl RealpathError
{
    fn from_io(path: &Path, err: &io::Error) -> Self
    {
        Self {
            code: err.raw_os_error().unwrap_or(-1),
            message: err.kind().to_string(),
            path: path.to_path_buf(),
        }
    }
}

/// Return the absolute, canonical form of `path` with all symlinks resolved.
///
/// ## Errors
///
/// Returns a [`RealpathError`] carrying the OS error code if the path does
/// not exist or cannot be resolved.
///
/// ```rust
/// let here = tether_core::fs::realpath(".").unwrap();
/// assert!(here.is_absolute());
/// ```
pub fn realpath(path: impl AsRef<Path>) -> Result<PathBuf, RealpathError>
{
    let path = path.as_ref();
    std::fs::canonicalize(path).map_err(|err| {
        tracing::debug!(path = %path.display(), %err, "realpath failed");
        RealpathError::from_io(path, &err)
    })
}
