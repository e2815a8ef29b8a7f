//! swcache - Offline asset cache manager
//!
//! Keeps one versioned cache of responses per deployment, seeds it with a
//! known asset list at install, deletes caches of older versions at
//! activation, and serves every eligible request network-first with the
//! cache as fallback.

pub mod assets;
pub mod cli;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod lifecycle;
pub mod request;
pub mod store;
pub mod transport;

pub use error::{CacheError, CacheResult};
