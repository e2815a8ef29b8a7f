//! CLI command implementations

pub mod caches;
pub mod config;
pub mod fetch;
pub mod install;
pub mod status;

pub use caches::execute as caches;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use install::execute as install;
pub use status::execute as status;
