//! Command providers: run a local tool and read its version string.
//!
//! stdout and stderr are both scanned because some tools (older Pythons,
//! for one) print their version on stderr. A tool that does not finish
//! within its deadline is killed and the provider fails.

use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::DiscoveryProvider;
use crate::config::CommandProviderConfig;
use crate::error::{Error, Result};

/// How long a version command may run before it is killed.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct CommandProvider {
    name: String,
    product: String,
    program: String,
    args: Vec<String>,
    pattern: Regex,
    timeout: Duration,
}

impl CommandProvider {
    /// `pattern` is matched against the tool's output; its first capture
    /// group (or the whole match when it has none) is the version.
    pub fn new(
        name: impl Into<String>,
        product: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
        pattern: &str,
    ) -> Result<Self> {
        let name = name.into();
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::provider_load_failed(&name, format!("bad version pattern: {e}")))?;
        let provider = Self {
            product: product.into(),
            program: program.into(),
            args,
            pattern,
            name,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        };
        if provider.product.is_empty() || provider.program.is_empty() {
            return Err(Error::provider_load_failed(
                &provider.name,
                "product and program must not be empty",
            ));
        }
        Ok(provider)
    }

    pub fn from_config(cfg: &CommandProviderConfig) -> Result<Self> {
        Self::new(
            cfg.name.clone(),
            cfg.product.clone(),
            cfg.program.clone(),
            cfg.args.clone(),
            &cfg.pattern,
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    /// Extract the version from tool output.
    pub fn parse_version(&self, output: &str) -> Option<String> {
        let caps = self.pattern.captures(output)?;
        let m = caps.get(1).or_else(|| caps.get(0))?;
        let version = m.as_str().trim();
        (!version.is_empty()).then(|| version.to_string())
    }
}

#[async_trait]
impl DiscoveryProvider for CommandProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn discover(&self) -> Result<(String, String)> {
        debug!(provider = %self.name, program = %self.program, args = ?self.args, "Running version command");

        let run = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output();
        let out = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                Error::provider_failed(
                    &self.name,
                    format!("{} did not finish within {:?}", self.program, self.timeout),
                )
            })?
            .map_err(|e| Error::provider_failed(&self.name, format!("could not run {}: {e}", self.program)))?;

        if !out.status.success() {
            return Err(Error::provider_failed(
                &self.name,
                format!("{} exited with {}", self.program, out.status),
            ));
        }

        let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&out.stderr));

        match self.parse_version(&text) {
            Some(version) => Ok((self.product.clone(), version)),
            None => Err(Error::provider_failed(
                &self.name,
                format!("no version found in output of {}", self.program),
            )),
        }
    }
}

/// The command providers that ship with the exporter.
pub(crate) fn shipped() -> Result<Vec<CommandProvider>> {
    Ok(vec![
        CommandProvider::new(
            "python",
            "python",
            "python",
            vec!["--version".into()],
            r"Python ([0-9]+\.[0-9]+)",
        )?,
        CommandProvider::new(
            "docker",
            "docker-engine",
            "docker",
            vec!["version".into(), "--format".into(), "{{ .Server.Version }}".into()],
            r"^([0-9]+\.[0-9]+)",
        )?,
        CommandProvider::new(
            "ansible",
            "ansible-core",
            "ansible",
            vec!["--version".into()],
            r"core ([0-9]+\.[0-9]+)",
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipped_named(name: &str) -> CommandProvider {
        shipped().unwrap().into_iter().find(|p| p.name() == name).unwrap()
    }

    #[test]
    fn test_python_output() {
        let p = shipped_named("python");
        assert_eq!(p.parse_version("Python 3.11.4\n").as_deref(), Some("3.11"));
        assert_eq!(p.product(), "python");
    }

    #[test]
    fn test_docker_output() {
        let p = shipped_named("docker");
        assert_eq!(p.parse_version("27.3.1\n").as_deref(), Some("27.3"));
        assert_eq!(p.product(), "docker-engine");
    }

    #[test]
    fn test_ansible_output() {
        let p = shipped_named("ansible");
        let out = "ansible [core 2.17.5]\n  config file = None\n  python version = 3.12.3\n";
        assert_eq!(p.parse_version(out).as_deref(), Some("2.17"));
        assert_eq!(p.product(), "ansible-core");
    }

    #[test]
    fn test_unparsable_output() {
        let p = shipped_named("python");
        assert_eq!(p.parse_version("command not found"), None);
    }

    #[test]
    fn test_pattern_without_group_uses_whole_match() {
        let p = CommandProvider::new("x", "x", "x", vec![], r"[0-9]+\.[0-9]+").unwrap();
        assert_eq!(p.parse_version("release 1.24.3").as_deref(), Some("1.24"));
    }

    #[test]
    fn test_empty_program_rejected() {
        let err = CommandProvider::new("x", "x", "", vec![], ".*").err().unwrap();
        assert_eq!(err.as_label(), "provider_load_failed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discover_runs_subprocess() {
        let p = CommandProvider::new(
            "fake-python",
            "python",
            "sh",
            vec!["-c".into(), "echo 'Python 3.12.1'".into()],
            r"Python ([0-9]+\.[0-9]+)",
        )
        .unwrap();
        let (product, version) = p.discover().await.unwrap();
        assert_eq!(product, "python");
        assert_eq!(version, "3.12");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discover_reads_stderr() {
        let p = CommandProvider::new(
            "old-python",
            "python",
            "sh",
            vec!["-c".into(), "echo 'Python 2.7.18' >&2".into()],
            r"Python ([0-9]+\.[0-9]+)",
        )
        .unwrap();
        assert_eq!(p.discover().await.unwrap().1, "2.7");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discover_failing_tool() {
        let p = CommandProvider::new("f", "f", "sh", vec!["-c".into(), "exit 3".into()], ".*").unwrap();
        let err = p.discover().await.unwrap_err();
        assert_eq!(err.as_label(), "provider_failed");

        let missing = CommandProvider::new(
            "missing",
            "m",
            "definitely-not-an-installed-tool-4821",
            vec![],
            ".*",
        )
        .unwrap();
        assert_eq!(missing.discover().await.unwrap_err().as_label(), "provider_failed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discover_hung_tool_times_out() {
        let p = CommandProvider::new("hung", "h", "sh", vec!["-c".into(), "sleep 30".into()], ".*")
            .unwrap()
            .with_timeout(Duration::from_millis(200));

        let started = std::time::Instant::now();
        let err = p.discover().await.unwrap_err();
        assert_eq!(err.as_label(), "provider_failed");
        assert!(err.to_string().contains("did not finish"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
