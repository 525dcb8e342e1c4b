//! Hierarchical configuration loader, grounded on `ConfigLoader` from the
//! teacher's `infrastructure::config::loader` module: programmatic defaults,
//! merged with a project YAML file, merged with a local-override YAML file,
//! merged with `SWARM_`-prefixed environment variables (highest priority).

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::{RetentionPolicy, SwarmOptions, Topology};

/// Errors raised while validating a loaded configuration.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid max_agents: {0}, must be between 1 and 100")]
    InvalidMaxAgents(usize),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("invalid retain_workspaces policy: {0}")]
    InvalidRetentionPolicy(String),

    #[error("invalid log level: {0}, must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}, must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("workspace_root cannot be empty")]
    EmptyWorkspaceRoot,

    #[error("invalid backoff configuration: backoff_base_ms ({0}) must be less than backoff_cap_ms ({1})")]
    InvalidBackoff(u64, u64),

    #[error("invalid max_attempts: {0}, cannot be 0")]
    InvalidMaxAttempts(u32),
}

/// Logging section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    pub level: String,
    pub format: String,
    pub log_dir: Option<String>,
    pub retention_days: u32,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_dir: None,
            retention_days: 30,
        }
    }
}

/// Top-level application configuration, merged from defaults + files + env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub max_agents: usize,
    pub topology: String,
    pub workspace_root: String,
    pub retain_workspaces: String,
    pub task_timeout_secs: u64,
    pub swarm_timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub logging: LoggingSection,
    /// Path to the LLM CLI executable the Worker Process Supervisor spawns
    /// (§6 `LLM_CLI_PATH`).
    pub llm_cli_path: String,
    /// Default `--allowed-tools` set when a task doesn't specify its own
    /// (§6 `LLM_CLI_DEFAULT_TOOLS`, comma-separated in the environment).
    pub llm_cli_default_tools: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let opts = SwarmOptions::default();
        Self {
            max_agents: opts.max_agents,
            topology: opts.topology.as_str().to_string(),
            workspace_root: opts.workspace_root.display().to_string(),
            retain_workspaces: "keep".to_string(),
            task_timeout_secs: opts.task_timeout.as_secs(),
            swarm_timeout_secs: opts.swarm_timeout.as_secs(),
            max_attempts: opts.retry_policy.max_attempts,
            backoff_base_ms: opts.retry_policy.backoff_base_ms,
            backoff_cap_ms: opts.retry_policy.backoff_cap_ms,
            logging: LoggingSection::default(),
            llm_cli_path: "claude".to_string(),
            llm_cli_default_tools: Vec::new(),
        }
    }
}

impl Config {
    /// Convert the flat, figment-friendly config into the typed
    /// `SwarmOptions` the Swarm Coordinator actually consumes.
    pub fn to_swarm_options(&self) -> Result<SwarmOptions, ConfigError> {
        let topology = Topology::from_str(&self.topology)
            .ok_or_else(|| ConfigError::InvalidTopology(self.topology.clone()))?;
        let retain_workspaces = RetentionPolicy::from_str(&self.retain_workspaces)
            .ok_or_else(|| ConfigError::InvalidRetentionPolicy(self.retain_workspaces.clone()))?;
        Ok(SwarmOptions {
            max_agents: self.max_agents,
            max_concurrent_tasks_per_agent: 3,
            task_timeout: std::time::Duration::from_secs(self.task_timeout_secs),
            swarm_timeout: std::time::Duration::from_secs(self.swarm_timeout_secs),
            topology,
            workspace_root: self.workspace_root.clone().into(),
            retain_workspaces,
            retry_policy: crate::domain::models::RetryPolicy {
                max_attempts: self.max_attempts,
                backoff_base_ms: self.backoff_base_ms,
                backoff_cap_ms: self.backoff_cap_ms,
            },
        })
    }
}

/// Loads and validates [`Config`] from the layered sources described above.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (`Serialized`)
    /// 2. `.swarm/config.yaml` (project config)
    /// 3. `.swarm/local.yaml` (project-local overrides, optional)
    /// 4. Environment variables (`SWARM_` prefix, highest priority)
    pub fn load() -> anyhow::Result<Config> {
        let mut config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".swarm/config.yaml"))
            .merge(Yaml::file(".swarm/local.yaml"))
            .merge(Env::prefixed("SWARM_").split("__"))
            .extract()?;
        Self::apply_unprefixed_env(&mut config);
        Self::validate(&config)?;
        Ok(config)
    }

    /// A handful of settings are read from bare (non-`SWARM_`-prefixed)
    /// environment variables per §6, since they're consumed directly by the
    /// core rather than by commands layered on top of it.
    fn apply_unprefixed_env(config: &mut Config) {
        if let Ok(root) = std::env::var("WORKSPACE_ROOT") {
            config.workspace_root = root;
        }
        if let Ok(path) = std::env::var("LLM_CLI_PATH") {
            config.llm_cli_path = path;
        }
        if let Ok(tools) = std::env::var("LLM_CLI_DEFAULT_TOOLS") {
            config.llm_cli_default_tools = tools
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.max_agents == 0 || config.max_agents > 100 {
            return Err(ConfigError::InvalidMaxAgents(config.max_agents));
        }
        if Topology::from_str(&config.topology).is_none() {
            return Err(ConfigError::InvalidTopology(config.topology.clone()));
        }
        if RetentionPolicy::from_str(&config.retain_workspaces).is_none() {
            return Err(ConfigError::InvalidRetentionPolicy(
                config.retain_workspaces.clone(),
            ));
        }
        if config.workspace_root.is_empty() {
            return Err(ConfigError::EmptyWorkspaceRoot);
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        if config.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.max_attempts));
        }
        if config.backoff_base_ms >= config.backoff_cap_ms {
            return Err(ConfigError::InvalidBackoff(
                config.backoff_base_ms,
                config.backoff_cap_ms,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.max_agents, 5);
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn validate_rejects_zero_agents() {
        let mut config = Config::default();
        config.max_agents = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxAgents(0))
        );
    }

    #[test]
    fn validate_rejects_too_many_agents() {
        let mut config = Config::default();
        config.max_agents = 101;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxAgents(101))
        );
    }

    #[test]
    fn validate_rejects_bad_topology() {
        let mut config = Config::default();
        config.topology = "starburst".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTopology(_))
        ));
    }

    #[test]
    fn validate_rejects_inverted_backoff() {
        let mut config = Config::default();
        config.backoff_base_ms = 30_000;
        config.backoff_cap_ms = 10_000;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(30_000, 10_000))
        );
    }

    #[test]
    fn validate_rejects_empty_workspace_root() {
        let mut config = Config::default();
        config.workspace_root = String::new();
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyWorkspaceRoot)
        );
    }

    #[test]
    fn to_swarm_options_round_trips_defaults() {
        let config = Config::default();
        let opts = config.to_swarm_options().expect("should convert");
        assert_eq!(opts.max_agents, 5);
        assert_eq!(opts.topology, Topology::Hybrid);
    }

    #[test]
    fn hierarchical_merging_overrides_defaults() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(base_file, "max_agents: 5\nlogging:\n  level: info\n  format: json\n  retention_days: 30").unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "max_agents: 15").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.max_agents, 15);
        assert_eq!(config.logging.level, "info");
    }
}
