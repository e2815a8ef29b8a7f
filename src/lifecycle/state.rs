//! Worker lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one worker incarnation
///
/// ```text
/// Uninstalled -> Installing -> Installed -> Activating -> Active -> Redundant
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Uninstalled,
    /// Seeding the cache
    Installing,
    /// Installed, waiting to take control
    Installed,
    /// Retiring caches from older versions
    Activating,
    /// Controlling clients and intercepting requests
    Active,
    /// Superseded by a newer incarnation
    Redundant,
}

impl WorkerState {
    /// Whether requests are intercepted in this state
    pub fn intercepts(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninstalled => "uninstalled",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Redundant => "redundant",
        };
        f.write_str(s)
    }
}
