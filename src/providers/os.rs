//! OS provider: distribution id and version from `os-release`.
//!
//! `ID` becomes the product (`ubuntu`, `debian`, `rhel`, ...) and
//! `VERSION_ID` the version, which lines up with the lifecycle service's
//! product slugs for the common distributions.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{DiscoveryProvider, Origin};
use crate::error::{Error, Result};

const OS_RELEASE: &str = "/etc/os-release";

pub struct OsProvider {
    path: PathBuf,
}

impl OsProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for OsProvider {
    fn default() -> Self {
        Self::new(OS_RELEASE)
    }
}

#[async_trait]
impl DiscoveryProvider for OsProvider {
    fn name(&self) -> &str {
        "os"
    }

    fn origin(&self) -> Origin {
        Origin::Os
    }

    async fn discover(&self) -> Result<(String, String)> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::provider_failed("os", format!("{}: {e}", self.path.display())))?;

        parse_os_release(&contents).ok_or_else(|| {
            Error::provider_failed(
                "os",
                format!("{} has no ID/VERSION_ID", self.path.display()),
            )
        })
    }
}

/// Extract `(ID, VERSION_ID)` from os-release contents.
pub fn parse_os_release(contents: &str) -> Option<(String, String)> {
    let mut id = None;
    let mut version = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = unquote(value.trim());
        match key.trim() {
            "ID" => id = Some(value),
            "VERSION_ID" => version = Some(value),
            _ => {}
        }
    }

    match (id, version) {
        (Some(id), Some(version)) if !id.is_empty() && !version.is_empty() => Some((id, version)),
        _ => None,
    }
}

fn unquote(value: &str) -> String {
    for q in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(q).and_then(|v| v.strip_suffix(q)) {
            return inner.to_string();
        }
    }
    value.to_string()
}

/// Host identity for the `host` label.
pub fn hostname() -> String {
    ["/proc/sys/kernel/hostname", "/etc/hostname"]
        .iter()
        .filter_map(|p| std::fs::read_to_string(p).ok())
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
