//! Configuration for the coshell server
//!
//! Loaded from an optional TOML file; every field carries a default so
//! an empty file (or none at all) yields a working configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Also listen on a Unix domain socket at this path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<PathBuf>,
    /// Base directory the host filesystem editor resolves paths against
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Prefix for the session tool names (`<prefix>_start`, ...)
    #[serde(default = "default_session_prefix")]
    pub session_prefix: String,
    /// Instructions surfaced in the `initialize` result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Session manager tuning
    #[serde(default)]
    pub tuning: SessionTuning,
    /// Stateless bash tool tuning
    #[serde(default)]
    pub bash: BashToolConfig,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_session_prefix() -> String {
    "session".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket: None,
            base_dir: default_base_dir(),
            session_prefix: default_session_prefix(),
            instructions: None,
            tuning: SessionTuning::default(),
            bash: BashToolConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }
}

/// Tuning knobs for the session manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTuning {
    /// Command output is truncated beyond this many characters
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
    /// Upper bound for a single exec timeout
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,
    /// Exec timeout applied when the caller supplies none
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// How long the readiness handshake may take before startup fails
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

fn default_max_output_chars() -> usize {
    30_000
}

fn default_max_timeout_ms() -> u64 {
    600_000
}

fn default_timeout_ms() -> u64 {
    120_000
}

fn default_ready_timeout_secs() -> u64 {
    300
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            max_output_chars: default_max_output_chars(),
            max_timeout_ms: default_max_timeout_ms(),
            default_timeout_ms: default_timeout_ms(),
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}

/// Tuning knobs for the stateless bash tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BashToolConfig {
    /// Timeout in seconds applied when the caller supplies none
    #[serde(default = "default_bash_timeout_secs")]
    pub default_timeout_secs: u64,
    /// Upper bound for a single command timeout, in seconds
    #[serde(default = "default_bash_max_timeout_secs")]
    pub max_timeout_secs: u64,
    /// Combined output is truncated beyond this many bytes
    #[serde(default = "default_bash_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_bash_timeout_secs() -> u64 {
    120
}

fn default_bash_max_timeout_secs() -> u64 {
    600
}

fn default_bash_max_output_bytes() -> usize {
    30_720
}

impl Default for BashToolConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_bash_timeout_secs(),
            max_timeout_secs: default_bash_max_timeout_secs(),
            max_output_bytes: default_bash_max_output_bytes(),
        }
    }
}
