//! Real filesystem implementation of [`IoTransform`]
//!
//! Tree walks use `walkdir`, archives are deflate-compressed zip files. All
//! work runs on the blocking pool so the async callers stay responsive.

use crate::archive::rotate::delete_all_but_newest;
use crate::error::{WorldsnapError, WorldsnapResult};
use crate::io::IoTransform;
use async_trait::async_trait;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Filesystem-backed transforms
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTransform;

impl FsTransform {
    /// Create a new filesystem transform
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IoTransform for FsTransform {
    async fn copy_directory(&self, src: &Path, dst: &Path) -> WorldsnapResult<()> {
        let (src, dst) = (src.to_path_buf(), dst.to_path_buf());
        let copied = run_blocking("copy", move || copy_tree(&src, &dst)).await?;
        debug!("Copied {} files", copied);
        Ok(())
    }

    async fn delete_directory(&self, path: &Path) -> WorldsnapResult<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WorldsnapError::io(
                format!("deleting directory {}", path.display()),
                e,
            )),
        }
    }

    async fn compress_directory(&self, src: &Path, dst: &Path) -> WorldsnapResult<()> {
        let (src, dst) = (src.to_path_buf(), dst.to_path_buf());
        let archived = run_blocking("compress", move || zip_tree(&src, &dst)).await?;
        debug!("Archived {} files", archived);
        Ok(())
    }

    async fn delete_all_but_newest(&self, dir: &Path, prefix: &str, keep: usize) -> usize {
        let (dir, prefix) = (dir.to_path_buf(), prefix.to_string());
        match tokio::task::spawn_blocking(move || delete_all_but_newest(&dir, &prefix, keep)).await
        {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Archive rotation task failed: {}", e);
                0
            }
        }
    }
}

/// Run a blocking closure on the blocking pool, flattening join errors
async fn run_blocking<T, F>(what: &'static str, f: F) -> WorldsnapResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> WorldsnapResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WorldsnapError::Internal(format!("{what} task failed: {e}")))?
}

fn relative<'a>(root: &Path, path: &'a Path) -> WorldsnapResult<&'a Path> {
    path.strip_prefix(root)
        .map_err(|_| WorldsnapError::PathInvalid {
            path: path.to_path_buf(),
            reason: format!("not under {}", root.display()),
        })
}

fn walk_error(root: &Path, err: walkdir::Error) -> WorldsnapError {
    WorldsnapError::io(format!("walking {}", root.display()), err.into())
}

/// Copy a directory tree, returning the number of regular files copied
///
/// Files that disappear between listing and copying are skipped, since the
/// source is a live directory.
fn copy_tree(src: &Path, dst: &Path) -> WorldsnapResult<u64> {
    if !src.is_dir() {
        return Err(WorldsnapError::WorldMissing(src.to_path_buf()));
    }

    fs::create_dir_all(dst)
        .map_err(|e| WorldsnapError::io(format!("creating {}", dst.display()), e))?;

    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let rel = relative(src, entry.path())?;
        if rel.as_os_str().is_empty() {
            continue;
        }

        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| WorldsnapError::io(format!("creating {}", target.display()), e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            match fs::copy(entry.path(), &target) {
                Ok(_) => copied += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("Skipping {}, removed during copy", entry.path().display());
                }
                Err(e) => {
                    return Err(WorldsnapError::io(
                        format!("copying {}", entry.path().display()),
                        e,
                    ))
                }
            }
        }
    }

    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> WorldsnapResult<()> {
    let target = fs::read_link(src)
        .map_err(|e| WorldsnapError::io(format!("reading link {}", src.display()), e))?;
    std::os::unix::fs::symlink(&target, dst)
        .map_err(|e| WorldsnapError::io(format!("creating link {}", dst.display()), e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, _dst: &Path) -> WorldsnapResult<()> {
    debug!("Skipping symlink {}", src.display());
    Ok(())
}

/// Hidden sibling used while an archive is being written
fn partial_path(dst: &Path) -> WorldsnapResult<PathBuf> {
    let name = dst
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| WorldsnapError::PathInvalid {
            path: dst.to_path_buf(),
            reason: "archive path has no file name".to_string(),
        })?;
    Ok(dst.with_file_name(format!(".{name}.partial")))
}

/// Archive a directory tree into `dst`, returning the number of files stored
///
/// The archive only appears at `dst` once it is complete.
fn zip_tree(src: &Path, dst: &Path) -> WorldsnapResult<u64> {
    if !src.is_dir() {
        return Err(WorldsnapError::CacheVanished(src.to_path_buf()));
    }

    let partial = partial_path(dst)?;
    if let Some(parent) = partial.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| WorldsnapError::io(format!("creating {}", parent.display()), e))?;
    }

    let result = write_zip(src, &partial).and_then(|count| {
        fs::rename(&partial, dst)
            .map_err(|e| WorldsnapError::io(format!("moving archive to {}", dst.display()), e))?;
        Ok(count)
    });

    if result.is_err() {
        discard_partial(&partial);
    }
    result
}

fn discard_partial(partial: &Path) {
    match fs::remove_file(partial) {
        Ok(()) => debug!("Removed unfinished archive {}", partial.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove unfinished archive {}: {}", partial.display(), e),
    }
}

fn write_zip(src: &Path, out: &Path) -> WorldsnapResult<u64> {
    let file = File::create(out)
        .map_err(|e| WorldsnapError::io(format!("creating {}", out.display()), e))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let zip_err = |e: zip::result::ZipError| {
        WorldsnapError::io(format!("writing {}", out.display()), std::io::Error::other(e))
    };

    let mut stored = 0;
    for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let rel = relative(src, entry.path())?;
        if rel.as_os_str().is_empty() {
            continue;
        }

        let name = rel.to_string_lossy().replace('\\', "/");
        let file_type = entry.file_type();

        if file_type.is_dir() {
            zip.add_directory(name, options).map_err(zip_err)?;
        } else if file_type.is_file() {
            zip.start_file(name, options).map_err(zip_err)?;
            let mut input = File::open(entry.path())
                .map_err(|e| WorldsnapError::io(format!("opening {}", entry.path().display()), e))?;
            std::io::copy(&mut input, &mut zip)
                .map_err(|e| WorldsnapError::io(format!("archiving {}", entry.path().display()), e))?;
            stored += 1;
        } else {
            debug!("Skipping {} (not a regular file)", entry.path().display());
        }
    }

    zip.finish().map_err(zip_err)?;
    Ok(stored)
}
