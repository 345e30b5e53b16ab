//! Filesystem transforms used by the cache controller
//!
//! The controller never touches world or archive contents directly. It goes
//! through an [`IoTransform`], so tests can swap in an instrumented
//! implementation and production uses [`FsTransform`].

mod fs;
#[cfg(test)]
pub(crate) mod mock;

pub use fs::FsTransform;

use crate::error::WorldsnapResult;
use async_trait::async_trait;
use std::path::Path;

/// Directory-level I/O consumed by the cache controller
///
/// All operations may be long-running (proportional to the size of the
/// directory involved). Implementations must not return before the work is
/// finished, since the caller holds the cache lock for the duration.
#[async_trait]
pub trait IoTransform: Send + Sync {
    /// Recursively copy `src` into a new directory at `dst`
    async fn copy_directory(&self, src: &Path, dst: &Path) -> WorldsnapResult<()>;

    /// Recursively delete the directory at `path`
    async fn delete_directory(&self, path: &Path) -> WorldsnapResult<()>;

    /// Write the contents of `src` as an archive file at `dst`
    async fn compress_directory(&self, src: &Path, dst: &Path) -> WorldsnapResult<()>;

    /// Delete all but the `keep` newest files in `dir` whose name carries `prefix`
    ///
    /// Best-effort: individual failures are logged, not returned. Returns the
    /// number of files removed.
    async fn delete_all_but_newest(&self, dir: &Path, prefix: &str, keep: usize) -> usize;
}
