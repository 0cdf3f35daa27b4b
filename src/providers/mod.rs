//! Discovery providers. Universal interface for "what is installed here?".
//!
//! A provider answers one question: which (product, version) pair should be
//! monitored. Built-in OS and kernel detection implement the trait, and so
//! do named command providers that run a local tool and pick the version
//! out of its output. Named providers live in a static [`ProviderRegistry`]
//! and are enabled by an allow-list at startup.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::CommandProviderConfig;
use crate::error::{Error, Result};

pub mod command;
pub mod kernel;
pub mod os;

pub use command::CommandProvider;
pub use kernel::KernelProvider;
pub use os::OsProvider;

// ── Core Types ──────────────────────────────────────────────────────

/// Where a monitored target came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    Os,
    Kernel,
    Provider(String),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Os => f.write_str("os"),
            Origin::Kernel => f.write_str("kernel"),
            Origin::Provider(name) => write!(f, "provider:{name}"),
        }
    }
}

/// A (product, version) pair under periodic observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredTarget {
    pub product: String,
    pub version: String,
    pub origin: Origin,
}

// ── Provider Trait ──────────────────────────────────────────────────

/// The discovery capability.
///
/// Every provider implements this. Adding a product = implementing this
/// trait (or declaring a command provider), then enabling it by name.
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    /// Unique provider name used in the allow-list (e.g. "python").
    fn name(&self) -> &str;

    fn origin(&self) -> Origin {
        Origin::Provider(self.name().to_string())
    }

    /// Determine the (product, version) pair, or fail with
    /// [`Error::ProviderFailed`].
    async fn discover(&self) -> Result<(String, String)>;
}

// ── Registry ────────────────────────────────────────────────────────

/// Named providers that can be enabled by configuration.
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn DiscoveryProvider>>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// Registry with the shipped command providers (`python`, `docker`,
    /// `ansible`).
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::empty();
        for provider in command::shipped()? {
            registry.register(Arc::new(provider));
        }
        Ok(registry)
    }

    /// Shipped providers plus the command providers declared in the
    /// configuration file. A declaration reusing a name replaces the
    /// shipped provider.
    pub fn with_declared(declared: &[CommandProviderConfig]) -> Result<Self> {
        let mut registry = Self::builtin()?;
        for decl in declared {
            registry.register(Arc::new(CommandProvider::from_config(decl)?));
        }
        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn DiscoveryProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Resolve an allow-list. Any unknown name is fatal.
    pub fn select(&self, names: &[String]) -> Result<Vec<Arc<dyn DiscoveryProvider>>> {
        names
            .iter()
            .map(|name| {
                self.providers.get(name).cloned().ok_or_else(|| {
                    Error::provider_load_failed(
                        name,
                        format!("unknown provider (available: {})", self.names().join(", ")),
                    )
                })
            })
            .collect()
    }
}

/// The OS and kernel providers, each optional.
pub fn builtin_providers(os: bool, kernel: bool) -> Vec<Arc<dyn DiscoveryProvider>> {
    let mut out: Vec<Arc<dyn DiscoveryProvider>> = Vec::new();
    if os {
        out.push(Arc::new(OsProvider::default()));
    }
    if kernel {
        out.push(Arc::new(KernelProvider::default()));
    }
    out
}

/// Run every provider once and collect the targets.
///
/// Providers run concurrently, so a slow one only delays the result by its
/// own deadline. A failing provider is logged and contributes nothing; the
/// others still run. A pair found by more than one provider is kept once,
/// with the origin of the earliest provider in `providers` that found it.
pub async fn discover_targets(providers: &[Arc<dyn DiscoveryProvider>]) -> Vec<MonitoredTarget> {
    let running: Vec<_> = providers
        .iter()
        .map(|provider| {
            let provider = Arc::clone(provider);
            tokio::spawn(async move { provider.discover().await })
        })
        .collect();

    let mut targets: Vec<MonitoredTarget> = Vec::new();

    for (provider, handle) in providers.iter().zip(running) {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(Error::provider_failed(provider.name(), format!("discovery task ended: {e}"))),
        };
        match outcome {
            Ok((product, version)) => {
                if targets.iter().any(|t| t.product == product && t.version == version) {
                    info!(
                        provider = %provider.name(),
                        product = %product,
                        version = %version,
                        "Target already discovered, skipping duplicate"
                    );
                    continue;
                }
                info!(
                    provider = %provider.name(),
                    product = %product,
                    version = %version,
                    "Discovered target"
                );
                targets.push(MonitoredTarget {
                    product,
                    version,
                    origin: provider.origin(),
                });
            }
            Err(e) => {
                warn!(
                    provider = %provider.name(),
                    error = %e,
                    "Provider failed, no target from this provider"
                );
            }
        }
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        name: &'static str,
        answer: Option<(&'static str, &'static str)>,
    }

    #[async_trait]
    impl DiscoveryProvider for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn discover(&self) -> Result<(String, String)> {
            match self.answer {
                Some((p, v)) => Ok((p.to_string(), v.to_string())),
                None => Err(Error::provider_failed(self.name, "not installed")),
            }
        }
    }

    fn fixed(name: &'static str, answer: Option<(&'static str, &'static str)>) -> Arc<dyn DiscoveryProvider> {
        Arc::new(Fixed { name, answer })
    }

    #[tokio::test]
    async fn test_failed_provider_does_not_block_others() {
        let providers = vec![
            fixed("a", Some(("python", "3.11"))),
            fixed("b", None),
            fixed("c", Some(("docker-engine", "27.3"))),
        ];
        let targets = discover_targets(&providers).await;
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].product, "python");
        assert_eq!(targets[0].origin, Origin::Provider("a".into()));
        assert_eq!(targets[1].product, "docker-engine");
    }

    #[tokio::test]
    async fn test_duplicates_kept_once() {
        let providers = vec![
            fixed("first", Some(("python", "3.11"))),
            fixed("second", Some(("python", "3.11"))),
            fixed("third", Some(("python", "3.12"))),
        ];
        let targets = discover_targets(&providers).await;
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].origin, Origin::Provider("first".into()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_command_does_not_block_discovery() {
        let hung = CommandProvider::new("hung", "h", "sh", vec!["-c".into(), "sleep 30".into()], ".*")
            .unwrap()
            .with_timeout(std::time::Duration::from_millis(300));
        let python = CommandProvider::new(
            "python",
            "python",
            "sh",
            vec!["-c".into(), "echo 'Python 3.12.1'".into()],
            r"Python ([0-9]+\.[0-9]+)",
        )
        .unwrap();
        let providers: Vec<Arc<dyn DiscoveryProvider>> = vec![Arc::new(hung), Arc::new(python)];

        let targets = tokio::time::timeout(std::time::Duration::from_secs(5), discover_targets(&providers))
            .await
            .expect("discovery should finish despite a hung tool");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].product, "python");
        assert_eq!(targets[0].version, "3.12");
    }

    #[test]
    fn test_builtin_registry_names() {
        let registry = ProviderRegistry::builtin().unwrap();
        assert_eq!(registry.names(), vec!["ansible", "docker", "python"]);
    }

    #[test]
    fn test_unknown_name_is_load_failure() {
        let registry = ProviderRegistry::builtin().unwrap();
        let err = registry
            .select(&["python".into(), "cobol".into()])
            .err()
            .unwrap();
        assert!(matches!(err, Error::ProviderLoadFailed { ref provider, .. } if provider == "cobol"));
    }

    #[test]
    fn test_select_preserves_order() {
        let registry = ProviderRegistry::builtin().unwrap();
        let selected = registry.select(&["python".into(), "ansible".into()]).unwrap();
        let names: Vec<_> = selected.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["python", "ansible"]);
    }

    #[test]
    fn test_declared_provider_joins_registry() {
        let decl = CommandProviderConfig {
            name: "node".into(),
            product: "nodejs".into(),
            program: "node".into(),
            args: vec!["--version".into()],
            pattern: r"v(\d+)\.".into(),
        };
        let registry = ProviderRegistry::with_declared(&[decl]).unwrap();
        assert!(registry.names().contains(&"node"));
        assert_eq!(registry.select(&["node".into()]).unwrap().len(), 1);
    }

    #[test]
    fn test_declared_bad_pattern_is_load_failure() {
        let decl = CommandProviderConfig {
            name: "broken".into(),
            product: "x".into(),
            program: "x".into(),
            args: vec![],
            pattern: "(unclosed".into(),
        };
        let err = ProviderRegistry::with_declared(&[decl]).err().unwrap();
        assert_eq!(err.as_label(), "provider_load_failed");
    }

    #[test]
    fn test_builtin_toggles() {
        assert_eq!(builtin_providers(true, true).len(), 2);
        let only_kernel = builtin_providers(false, true);
        assert_eq!(only_kernel.len(), 1);
        assert_eq!(only_kernel[0].origin(), Origin::Kernel);
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(Origin::Os.to_string(), "os");
        assert_eq!(Origin::Provider("python".into()).to_string(), "provider:python");
    }
}
