//! Per-world backup cache
//!
//! A backup never reads the live world directly. The world is first copied
//! into a cache directory, the cache is archived, and later backups reuse the
//! same cache until its lifetime ends. When the lifetime ends the cache is
//! deleted, so a stale copy never lingers on disk.
//!
//! # Cache States
//!
//! | State | On disk | Description |
//! |-------|---------|-------------|
//! | Absent | nothing | Never built, expired, or a rebuild failed |
//! | Rebuilding | staging copy | World being copied, lock held |
//! | Present | cache dir | Complete, readable until it goes stale |
//! | Deleting | cache dir | Expiry removing it, lock held |
//!
//! Rebuilds copy into a hidden sibling directory and rename it into place,
//! so a reader never sees a half-copied cache.

pub mod controller;
pub mod expiry;
pub mod policy;
pub mod registry;
pub mod state;

pub use controller::{CacheController, CacheSettings};
pub use expiry::{ExpiryTicket, ExpiryTimer};
pub use policy::{CachePolicy, TimeUnit};
pub use registry::CacheRegistry;
pub use state::CacheState;
