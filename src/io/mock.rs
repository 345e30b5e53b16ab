//! Instrumented [`IoTransform`] for tests
//!
//! Performs minimal real filesystem effects (so existence and mtime checks
//! behave) while recording every call and the peak number of operations in
//! flight at once.

use crate::archive::rotate::delete_all_but_newest;
use crate::error::{WorldsnapError, WorldsnapResult};
use crate::io::IoTransform;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoCall {
    Copy(PathBuf, PathBuf),
    Delete(PathBuf),
    Compress(PathBuf, PathBuf),
    Rotate(PathBuf, String, usize),
}

#[derive(Debug, Default)]
pub struct MockIo {
    calls: Mutex<Vec<IoCall>>,
    delay: Duration,
    pub fail_copy: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_compress: AtomicBool,
    /// Compress calls left that delete their source and report it vanished
    pub vanish_on_compress: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation sleeps this long while counted as in flight
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<IoCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn copies(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, IoCall::Copy(..)))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: IoCall) -> InFlight<'_> {
        self.calls.lock().unwrap().push(call);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        InFlight(&self.active)
    }

    fn injected(flag: &AtomicBool, what: &str) -> WorldsnapResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(WorldsnapError::io(
                format!("injected {what} failure"),
                std::io::Error::other("injected"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl IoTransform for MockIo {
    async fn copy_directory(&self, src: &Path, dst: &Path) -> WorldsnapResult<()> {
        let _in_flight = self
            .enter(IoCall::Copy(src.to_path_buf(), dst.to_path_buf()))
            .await;
        Self::injected(&self.fail_copy, "copy")?;
        std::fs::create_dir_all(dst).map_err(|e| WorldsnapError::io("mock copy", e))?;
        std::fs::write(dst.join("snapshot"), src.display().to_string())
            .map_err(|e| WorldsnapError::io("mock copy", e))
    }

    async fn delete_directory(&self, path: &Path) -> WorldsnapResult<()> {
        let _in_flight = self.enter(IoCall::Delete(path.to_path_buf())).await;
        Self::injected(&self.fail_delete, "delete")?;
        std::fs::remove_dir_all(path).map_err(|e| WorldsnapError::io("mock delete", e))
    }

    async fn compress_directory(&self, src: &Path, dst: &Path) -> WorldsnapResult<()> {
        let _in_flight = self
            .enter(IoCall::Compress(src.to_path_buf(), dst.to_path_buf()))
            .await;
        Self::injected(&self.fail_compress, "compress")?;
        let vanish = self
            .vanish_on_compress
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if vanish {
            std::fs::remove_dir_all(src).map_err(|e| WorldsnapError::io("mock vanish", e))?;
        }
        if !src.is_dir() {
            return Err(WorldsnapError::CacheVanished(src.to_path_buf()));
        }
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WorldsnapError::io("mock compress", e))?;
        }
        std::fs::write(dst, b"archive").map_err(|e| WorldsnapError::io("mock compress", e))
    }

    async fn delete_all_but_newest(&self, dir: &Path, prefix: &str, keep: usize) -> usize {
        let _in_flight = self
            .enter(IoCall::Rotate(dir.to_path_buf(), prefix.to_string(), keep))
            .await;
        delete_all_but_newest(dir, prefix, keep)
    }
}
