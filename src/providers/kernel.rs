//! Kernel provider: `MAJOR.MINOR` of the running Linux kernel.

use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

use super::{DiscoveryProvider, Origin};
use crate::error::{Error, Result};

const OSRELEASE: &str = "/proc/sys/kernel/osrelease";

pub struct KernelProvider {
    path: PathBuf,
}

impl KernelProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for KernelProvider {
    fn default() -> Self {
        Self::new(OSRELEASE)
    }
}

#[async_trait]
impl DiscoveryProvider for KernelProvider {
    fn name(&self) -> &str {
        "kernel"
    }

    fn origin(&self) -> Origin {
        Origin::Kernel
    }

    async fn discover(&self) -> Result<(String, String)> {
        let release = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::provider_failed("kernel", format!("{}: {e}", self.path.display())))?;

        let version = kernel_version(release.trim()).ok_or_else(|| {
            Error::provider_failed("kernel", format!("unrecognised kernel release {:?}", release.trim()))
        })?;
        Ok(("linux".to_string(), version))
    }
}

/// Leading `MAJOR.MINOR` of a kernel release string.
pub fn kernel_version(release: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"^[0-9]+\.[0-9]+").expect("static pattern"));
    re.find(release).map(|m| m.as_str().to_string())
}
