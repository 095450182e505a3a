//! Harness-wide configuration, loaded from a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config at {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to write config file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which agent CLI driver a roster entry binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentVariant {
    Trae,
    GeminiCli,
    ClaudeCode,
    Openhands,
}

impl AgentVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentVariant::Trae => "trae",
            AgentVariant::GeminiCli => "gemini-cli",
            AgentVariant::ClaudeCode => "claude-code",
            AgentVariant::Openhands => "openhands",
        }
    }
}

/// One roster entry: which driver to instantiate, and overrides for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub variant: AgentVariant,
    #[serde(default)]
    pub model_override: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// `MAX_EVAL_WORKERS` from spec.md §4.7.
    #[serde(default = "default_max_eval_workers")]
    pub max_eval_workers: usize,
    /// `MAX_SPECS_PER_REPO` from spec.md §4.7.
    #[serde(default = "default_max_specs_per_repo")]
    pub max_specs_per_repo: usize,
}

fn default_max_eval_workers() -> usize {
    4
}

fn default_max_specs_per_repo() -> usize {
    50
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_eval_workers: default_max_eval_workers(),
            max_specs_per_repo: default_max_specs_per_repo(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default = "default_docker_image")]
    pub default_image: String,
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,
    #[serde(default = "default_test_timeout_secs")]
    pub test_timeout_secs: u64,
    #[serde(default)]
    pub keep_containers: bool,
    #[serde(default)]
    pub use_xdist: bool,
}

fn default_docker_image() -> String {
    "python:3.11-slim".to_string()
}

fn default_agent_timeout_secs() -> u64 {
    1800
}

fn default_test_timeout_secs() -> u64 {
    300
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            default_image: default_docker_image(),
            agent_timeout_secs: default_agent_timeout_secs(),
            test_timeout_secs: default_test_timeout_secs(),
            keep_containers: false,
            use_xdist: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub http_proxy: Option<String>,
    #[serde(default)]
    pub https_proxy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default = "default_dataset_path")]
    pub dataset: PathBuf,
    #[serde(default = "default_harness_root")]
    pub harness_root: PathBuf,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("dataset.json")
}

fn default_harness_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset_path(),
            harness_root: default_harness_root(),
            agents: Vec::new(),
            concurrency: ConcurrencyConfig::default(),
            container: ContainerConfig::default(),
            proxy: None,
        }
    }
}

pub fn parse_harness_config(raw: &str) -> Result<HarnessConfig, toml::de::Error> {
    toml::from_str(raw)
}

pub fn load_harness_config(path: impl AsRef<Path>) -> Result<HarnessConfig, ConfigError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_harness_config(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_harness_config(config: &HarnessConfig, path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let serialized = toml::to_string_pretty(config).map_err(|source| ConfigError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, serialized).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_harness_config_applies_defaults_for_missing_sections() {
        let config = parse_harness_config("").expect("parse empty config");
        assert_eq!(config.concurrency.max_eval_workers, 4);
        assert_eq!(config.concurrency.max_specs_per_repo, 50);
        assert_eq!(config.container.default_image, "python:3.11-slim");
        assert!(config.agents.is_empty());
    }

    #[test]
    fn parse_harness_config_reads_agent_roster() {
        let raw = r#"
dataset = "swebench.json"

[[agents]]
name = "claude-main"
variant = "claude_code"
model_override = "claude-sonnet-4"

[[agents]]
name = "trae-default"
variant = "trae"

[concurrency]
max_eval_workers = 8

[container]
default_image = "python:3.12-slim"
keep_containers = true
"#;
        let config = parse_harness_config(raw).expect("parse config");
        assert_eq!(config.dataset, PathBuf::from("swebench.json"));
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.agents[0].variant, AgentVariant::ClaudeCode);
        assert_eq!(
            config.agents[0].model_override.as_deref(),
            Some("claude-sonnet-4")
        );
        assert_eq!(config.concurrency.max_eval_workers, 8);
        assert!(config.container.keep_containers);
    }

    #[test]
    fn save_then_load_harness_config_roundtrips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("harness.toml");
        let mut config = HarnessConfig::default();
        config.agents.push(AgentConfig {
            name: "gemini-main".to_string(),
            variant: AgentVariant::GeminiCli,
            model_override: None,
            extra_args: vec!["--yolo".to_string()],
        });

        save_harness_config(&config, &path).expect("save config");
        let loaded = load_harness_config(&path).expect("load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_harness_config_reports_read_error_for_missing_file() {
        let err = load_harness_config("/nonexistent/harness.toml").expect_err("missing file");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
