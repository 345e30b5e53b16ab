//! CLI command implementations

pub mod backup;
pub mod cache;
pub mod config;

pub use backup::execute as backup;
pub use cache::execute as cache;
pub use config::execute as config;
