//! worldsnap - consistent snapshot backups of live world directories
//!
//! Each world is copied into a short-lived cache, and the cache is what gets
//! archived. Backups taken while the cache is fresh reuse it instead of
//! copying the world again.

pub mod archive;
pub mod backup;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod io;

pub use error::{WorldsnapError, WorldsnapResult};
