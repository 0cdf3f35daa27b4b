//! Process configuration.
//!
//! Precedence: command-line flag > environment variable > YAML config file
//! > default. Everything is resolved into [`Settings`] before the exporter
//! core starts; the core only ever sees plain values.

use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::DEFAULT_BASE_URL;
use crate::error::{Error, Result};

const DEFAULT_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 2112;
const DEFAULT_REFRESH_HOURS: u64 = 24;
const DEFAULT_TIMEOUT_SECS: u64 = 2;
const DEFAULT_CONFIG_NAME: &str = ".eol-exporter.yaml";

// ── Command Line ────────────────────────────────────────────────────

/// Prometheus exporter for end-of-life dates of installed software.
///
/// Monitors the OS and kernel by default; more products can be added with
/// discovery providers (`--provider python --provider docker`).
#[derive(Parser, Debug, Default)]
#[command(name = "eol-exporter", author, version, about, long_about = None)]
pub struct Args {
    /// Config file (default: ~/.eol-exporter.yaml if present)
    #[arg(long, env = "EOL_EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "EOL_EXPORTER_ADDRESS")]
    pub address: Option<String>,

    /// Port to listen on
    #[arg(long, env = "EOL_EXPORTER_PORT")]
    pub port: Option<u16>,

    /// Lifecycle API base URL
    #[arg(long, env = "EOL_EXPORTER_API_URL")]
    pub api_url: Option<String>,

    /// Discovery provider to enable (repeatable)
    #[arg(long = "provider", env = "EOL_EXPORTER_PROVIDERS", value_delimiter = ',')]
    pub providers: Vec<String>,

    /// Hours between refreshes of each target
    #[arg(long, env = "EOL_EXPORTER_REFRESH_HOURS")]
    pub refresh_hours: Option<u64>,

    /// Lifecycle API request timeout in seconds
    #[arg(long, env = "EOL_EXPORTER_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Value of the `host` label (default: system hostname)
    #[arg(long, env = "EOL_EXPORTER_HOST")]
    pub host: Option<String>,

    /// Emit JSON logs
    #[arg(long, env = "EOL_EXPORTER_LOG_JSON")]
    pub log_json: bool,
}

// ── Config File ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub api_url: Option<String>,
    pub providers: Option<Vec<String>>,
    pub refresh_interval_hours: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub host: Option<String>,
    pub log_json: Option<bool>,
    pub builtin: BuiltinConfig,
    pub command_providers: Vec<CommandProviderConfig>,
}

/// Toggles for the OS and kernel providers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuiltinConfig {
    pub os: bool,
    pub kernel: bool,
}

impl Default for BuiltinConfig {
    fn default() -> Self {
        Self { os: true, kernel: true }
    }
}

/// A command provider declared in the config file.
///
/// ```yaml
/// command_providers:
///   - name: node
///     product: nodejs
///     program: node
///     args: ["--version"]
///     pattern: 'v([0-9]+)\.'
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandProviderConfig {
    pub name: String,
    pub product: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub pattern: String,
}

pub fn parse_file(contents: &str) -> Result<FileConfig> {
    if contents.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(contents).map_err(|e| Error::config(format!("config file: {e}")))
}

/// Load the config file named on the command line (must exist), or the
/// default one in the home directory (skipped when absent).
pub fn load_file(explicit: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>)> {
    let (path, required) = match explicit {
        Some(p) => (p.to_path_buf(), true),
        None => match dirs::home_dir() {
            Some(home) => (home.join(DEFAULT_CONFIG_NAME), false),
            None => return Ok((FileConfig::default(), None)),
        },
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok((parse_file(&contents)?, Some(path))),
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            Ok((FileConfig::default(), None))
        }
        Err(e) => Err(Error::config(format!("{}: {e}", path.display()))),
    }
}

// ── Resolved Settings ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub address: String,
    pub port: u16,
    pub api_url: String,
    pub providers: Vec<String>,
    pub refresh_interval: Duration,
    pub timeout: Duration,
    pub host: String,
    pub log_json: bool,
    pub builtin: BuiltinConfig,
    pub command_providers: Vec<CommandProviderConfig>,
}

impl Settings {
    /// Merge flags/env over the file over defaults. `fallback_host` is only
    /// called when neither source names a host.
    pub fn resolve(args: &Args, file: FileConfig, fallback_host: impl FnOnce() -> String) -> Result<Self> {
        let refresh_hours = args
            .refresh_hours
            .or(file.refresh_interval_hours)
            .unwrap_or(DEFAULT_REFRESH_HOURS);
        if refresh_hours == 0 {
            return Err(Error::config("refresh interval must be at least one hour"));
        }
        let refresh_secs = refresh_hours
            .checked_mul(3600)
            .ok_or_else(|| Error::config(format!("refresh interval of {refresh_hours} hours is too large")))?;

        let timeout_secs = args.timeout_secs.or(file.timeout_secs).unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(Error::config("timeout must be at least one second"));
        }

        let providers = if args.providers.is_empty() {
            file.providers.unwrap_or_default()
        } else {
            args.providers.clone()
        };
        let providers: Vec<String> = providers
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let host = match args.host.clone().or(file.host) {
            Some(h) if !h.trim().is_empty() => h,
            _ => fallback_host(),
        };

        Ok(Self {
            address: args
                .address
                .clone()
                .or(file.address)
                .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
            api_url: args
                .api_url
                .clone()
                .or(file.api_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            providers,
            refresh_interval: Duration::from_secs(refresh_secs),
            timeout: Duration::from_secs(timeout_secs),
            host,
            log_json: args.log_json || file.log_json.unwrap_or(false),
            builtin: file.builtin,
            command_providers: file.command_providers,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
