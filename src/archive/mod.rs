//! Archive naming and history rotation
//!
//! Archives for one world share a name prefix (the world name) so the
//! rotator can group them without any index file.

pub mod naming;
pub mod rotate;

pub use naming::{archive_file_name, archive_timestamp, world_prefix, ARCHIVE_EXTENSION};
pub use rotate::{delete_all_but_newest, list_archives, matches_prefix, ArchiveEntry};
