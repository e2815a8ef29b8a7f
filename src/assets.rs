//! Base path discovery and asset list resolution
//!
//! The worker never hardcodes where it is deployed. The base path is the
//! worker script's own path up to and including its last `/`, so the same
//! build serves from `/` or from a subdirectory such as `/app/`.

use crate::config::Config;
use std::fmt;

/// URL prefix the worker and its assets are deployed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasePath(String);

impl BasePath {
    /// Derive the base path from the worker script path
    pub fn from_script_path(script_path: &str) -> Self {
        let path = strip_origin(script_path);
        let prefix = match path.rfind('/') {
            Some(idx) => &path[..=idx],
            None => "",
        };
        if prefix.is_empty() {
            Self("/".to_string())
        } else {
            Self(prefix.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Anchor a relative asset entry to this base path. Absolute URLs and
    /// absolute paths are returned unchanged.
    pub fn join(&self, entry: &str) -> String {
        if is_absolute_url(entry) || entry.starts_with('/') {
            entry.to_string()
        } else {
            format!("{}{}", self.0, entry)
        }
    }
}

impl fmt::Display for BasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deployment scope: optional origin plus base path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub origin: Option<String>,
    pub base_path: BasePath,
}

impl Scope {
    pub fn new(origin: Option<String>, script_path: &str) -> Self {
        Self {
            origin: origin.map(|o| o.trim_end_matches('/').to_string()),
            base_path: BasePath::from_script_path(script_path),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.worker.origin.clone(), &config.worker.script_path)
    }

    /// Turn a path or URL into the identifier used for fetching and caching.
    /// Paths are prefixed with the origin when one is configured.
    pub fn resolve(&self, path_or_url: &str) -> String {
        if is_absolute_url(path_or_url) {
            return path_or_url.to_string();
        }
        let path = self.base_path.join(path_or_url);
        match &self.origin {
            Some(origin) => format!("{}{}", origin, path),
            None => path,
        }
    }
}

/// Ordered, immutable list of resolved resource identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetList(Vec<String>);

impl AssetList {
    pub fn new(urls: Vec<String>) -> Self {
        Self(urls)
    }

    /// Resolve configured entries against a scope, preserving order and
    /// dropping duplicates
    pub fn resolve(scope: &Scope, entries: &[String]) -> Self {
        let mut urls: Vec<String> = Vec::with_capacity(entries.len());
        for entry in entries {
            let url = scope.resolve(entry.trim());
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Self(urls)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn is_absolute_url(s: &str) -> bool {
    s.contains("://")
}

fn strip_origin(s: &str) -> &str {
    match s.find("://") {
        Some(idx) => {
            let rest = &s[idx + 3..];
            rest.find('/').map_or("/", |slash| &rest[slash..])
        }
        None => s,
    }
}
