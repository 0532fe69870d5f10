//! YAML configuration for a WordPress deployment
//!
//! `${VAR}` placeholders are resolved from the environment before the YAML is
//! parsed. Unknown variables are left untouched so that validation can point
//! at them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use wpcraft_error::{Error, ErrorKind, Result};
use wpcraft_llm::{ProviderConfig, ProviderType};

use crate::executor::ExecutorSettings;

/// Root configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmSettings,
    pub wordpress: WordPressSettings,
    pub mysql: MySqlSettings,
    #[serde(default)]
    pub docker: DockerSettings,
    #[serde(default)]
    pub agents: AgentSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressSettings {
    #[serde(default = "default_wordpress_version")]
    pub version: String,
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    pub admin: AdminSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSettings {
    pub user: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MySqlSettings {
    #[serde(default = "default_mysql_version")]
    pub version: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub name: String,
    pub user: String,
    pub password: String,
    pub root_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerSettings {
    #[serde(default = "default_compose_file")]
    pub compose_file: PathBuf,
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default = "default_compose_command")]
    pub compose_command: String,
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            compose_file: default_compose_file(),
            project_name: default_project_name(),
            compose_command: default_compose_command(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            verbose: false,
            health_timeout_secs: default_health_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
            format: LogFormat::default(),
        }
    }
}

/// Output format of log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Json,
}

fn default_max_tokens() -> usize { 4096 }
fn default_llm_timeout() -> u64 { 120 }
fn default_wordpress_version() -> String { "latest".into() }
fn default_host() -> String { "localhost".into() }
fn default_mysql_version() -> String { "8.0".into() }
fn default_mysql_port() -> u16 { 3306 }
fn default_compose_file() -> PathBuf { PathBuf::from("docker-compose.yml") }
fn default_project_name() -> String { "wordpress".into() }
fn default_compose_command() -> String { "docker compose".into() }
fn default_max_iterations() -> usize { 15 }
fn default_health_timeout() -> u64 { 60 }
fn default_log_level() -> String { "INFO".into() }
fn default_log_file() -> PathBuf { PathBuf::from("wordpress_manager.log") }

/// Log level names accepted in `logging.level`
pub const LOG_LEVELS: &[&str] = &["TRACE", "DEBUG", "INFO", "WARNING", "WARN", "ERROR", "CRITICAL"];

/// Replace every `${NAME}` with `lookup(NAME)`, keeping unknown placeholders verbatim.
pub fn substitute_env_vars<F>(content: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| {
        Error::unexpected("invalid placeholder pattern").set_source(e)
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let name = &caps[1];
        lookup(name).unwrap_or_else(|| format!("${{{}}}", name))
    });

    Ok(result.into_owned())
}

fn is_placeholder(value: &str) -> bool {
    value.starts_with("${") && value.ends_with('}')
}

impl Config {
    /// Read, substitute and validate the configuration at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::from(e)
                .with_operation("config::load")
                .with_context("path", path.display().to_string())
        })?;

        tracing::debug!(path = %path.display(), "loaded configuration file");
        Self::from_yaml_str(&content)
    }

    /// Parse configuration text using the process environment for substitution
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Self::from_yaml_str_with(content, |name| std::env::var(name).ok())
    }

    /// Parse configuration text with an explicit variable lookup
    pub fn from_yaml_str_with<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = substitute_env_vars(content, lookup)?;
        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            Error::new(ErrorKind::ConfigInvalid, format!("failed to parse configuration: {}", e))
                .with_operation("config::parse")
                .set_source(e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values that serde cannot express
    pub fn validate(&self) -> Result<()> {
        ProviderType::from_str(&self.llm.provider)
            .map_err(|e| Error::config_invalid("llm.provider", e.to_string()))?;

        let required = [
            ("llm.model", self.llm.model.as_str()),
            ("wordpress.admin.user", self.wordpress.admin.user.as_str()),
            ("wordpress.admin.password", self.wordpress.admin.password.as_str()),
            ("mysql.database.name", self.mysql.database.name.as_str()),
            ("mysql.database.user", self.mysql.database.user.as_str()),
            ("mysql.database.password", self.mysql.database.password.as_str()),
            ("mysql.database.root_password", self.mysql.database.root_password.as_str()),
            ("docker.project_name", self.docker.project_name.as_str()),
            ("docker.compose_command", self.docker.compose_command.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(Error::config_invalid(field, "must not be empty"));
            }
            if is_placeholder(value.trim()) {
                return Err(Error::config_invalid(
                    field,
                    format!("unresolved environment variable {}", value.trim()),
                ));
            }
        }

        if self.wordpress.port == 0 {
            return Err(Error::config_invalid("wordpress.port", "must be between 1 and 65535"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::config_invalid("llm.temperature", "must be between 0.0 and 2.0"));
        }
        if self.agents.max_iterations == 0 {
            return Err(Error::config_invalid("agents.max_iterations", "must be at least 1"));
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_uppercase().as_str()) {
            return Err(Error::config_invalid(
                "logging.level",
                format!("unknown level '{}'", self.logging.level),
            ));
        }

        Ok(())
    }

    /// `--verbose` turns on agent tracing and debug logging
    pub fn apply_verbose(&mut self, verbose: bool) {
        if verbose {
            self.agents.verbose = true;
            self.logging.level = "DEBUG".into();
        }
    }

    /// Base URL where the site is published
    pub fn wordpress_url(&self) -> String {
        format!("http://{}:{}", self.wordpress.host, self.wordpress.port)
    }

    /// Loop settings shared by every agent
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            model: Some(self.llm.model.clone()),
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
            max_iterations: self.agents.max_iterations,
            verbose: self.agents.verbose,
        }
    }
}

impl LlmSettings {
    pub fn provider_type(&self) -> Result<ProviderType> {
        ProviderType::from_str(&self.provider)
            .map_err(|e| Error::config_invalid("llm.provider", e.to_string()))
    }

    /// Resolve the API key and build the provider configuration.
    ///
    /// A configured key wins unless it is empty or an unresolved placeholder,
    /// in which case the provider's environment variable is consulted.
    pub fn provider_config<F>(&self, lookup: F) -> Result<ProviderConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider_type = self.provider_type()?;
        let env_name = provider_type.api_key_env();

        let api_key = self.api_key.clone()
            .filter(|k| !k.trim().is_empty() && !is_placeholder(k.trim()))
            .or_else(|| lookup(env_name).filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| {
                Error::config_invalid(
                    "llm.api_key",
                    format!("missing API key; set it in the configuration or export {}", env_name),
                )
            })?;

        let mut config = ProviderConfig::for_type(provider_type, api_key)
            .with_model(self.model.clone())
            .with_timeout(self.timeout_secs);
        if let Some(base_url) = self.base_url.as_ref().filter(|u| !u.trim().is_empty()) {
            config = config.with_base_url(base_url.clone());
        }
        Ok(config)
    }
}
