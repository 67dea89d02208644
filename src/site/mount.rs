//! Mount Resolution
//!
//! Maps an inbound host and path onto a site and the path inside it.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::MountConfig;
use crate::http::PageRequest;

/// Where a request landed: the site serving it, the mount prefix that
/// matched and the remainder of the path below that prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMount {
    pub site: String,
    pub mount_path: String,
    pub path: String,
}

/// Resolves requests to mounts.
#[async_trait]
pub trait MountResolver: Send + Sync {
    async fn resolve(&self, request: &PageRequest) -> Option<ResolvedMount>;
}

// == Mount ==
/// One configured mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Host the mount applies to; `None` matches any host.
    pub host: Option<String>,
    /// Path prefix, always starting with `/` and without a trailing slash
    /// except for the root mount.
    pub path: String,
    pub site: String,
}

impl Mount {
    pub fn new(host: Option<&str>, path: &str, site: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        let path = if trimmed.is_empty() {
            "/".to_string()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };

        Self {
            host: host.map(str::to_ascii_lowercase),
            path,
            site: site.to_string(),
        }
    }

    /// Path below this mount, or `None` when `path` lies outside it.
    fn remainder<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.path == "/" {
            return Some(path);
        }
        let rest = path.strip_prefix(self.path.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }

    fn matches_host(&self, host: &str) -> bool {
        self.host
            .as_deref()
            .map_or(true, |expected| expected.eq_ignore_ascii_case(host))
    }
}

// == Static Mounts ==
/// Fixed mount table. The longest matching prefix wins; among equal
/// prefixes a host-specific mount beats a wildcard one.
#[derive(Debug, Clone, Default)]
pub struct StaticMounts {
    mounts: Vec<Mount>,
}

impl StaticMounts {
    pub fn new(mounts: Vec<Mount>) -> Self {
        Self { mounts }
    }

    pub fn from_config(mounts: &[MountConfig]) -> Self {
        Self::new(
            mounts
                .iter()
                .map(|mount| Mount::new(mount.host.as_deref(), &mount.path, &mount.site))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    fn best_match(&self, host: &str, path: &str) -> Option<ResolvedMount> {
        self.mounts
            .iter()
            .filter(|mount| mount.matches_host(host))
            .filter_map(|mount| mount.remainder(path).map(|rest| (mount, rest)))
            .max_by_key(|(mount, _)| (mount.path.len(), mount.host.is_some()))
            .map(|(mount, rest)| ResolvedMount {
                site: mount.site.clone(),
                mount_path: mount.path.clone(),
                path: rest.to_string(),
            })
    }
}

#[async_trait]
impl MountResolver for StaticMounts {
    async fn resolve(&self, request: &PageRequest) -> Option<ResolvedMount> {
        self.best_match(request.host(), request.path_info())
    }
}
