//! TOML-based configuration for medroute
//!
//! Everything the binary needs is read from one file (`medroute.toml` by
//! default). Secrets are never stored in the file: providers name the
//! environment variable that holds their key.
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [database]
//! path = "./data/medroute.db"
//!
//! [llm]
//! type = "openai"
//! api_key_env = "OPENAI_API_KEY"
//! model = "gpt-4o-mini"
//!
//! [orchestration]
//! max_hops = 20
//! ```

use crate::llm::{ClientOptions, Provider};
use crate::workflows::DEFAULT_APOLOGY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from medroute.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedrouteConfig {
    /// `[logging]`
    #[serde(default)]
    pub logging: LoggingConfig,

    /// `[database]`
    #[serde(default)]
    pub database: DatabaseConfig,

    /// `[memory]`
    #[serde(default)]
    pub memory: MemoryConfig,

    /// `[llm]`
    #[serde(default)]
    pub llm: LlmConfig,

    /// `[orchestration]`
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
}

// ============= Logging Configuration =============

/// Log filter and format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` overrides it
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Database Configuration =============

/// Slot database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the local slot database
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./data/medroute.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

// ============= Memory Configuration =============

/// Memory document locations and summarizer window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Directory holding the memory and profile documents
    #[serde(default = "default_memory_root")]
    pub root: PathBuf,

    /// Name of the per-patient memory document
    #[serde(default = "default_memory_file")]
    pub memory_file: String,

    /// Name of the patient profile document
    #[serde(default = "default_profiles_file")]
    pub profiles_file: String,

    /// Number of trailing messages handed to the summarizer
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_memory_root() -> PathBuf {
    PathBuf::from("./data")
}

fn default_memory_file() -> String {
    crate::memory::manager::MEMORY_FILENAME.to_string()
}

fn default_profiles_file() -> String {
    crate::memory::manager::PROFILES_FILENAME.to_string()
}

fn default_history_window() -> usize {
    crate::memory::DEFAULT_HISTORY_WINDOW
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            root: default_memory_root(),
            memory_file: default_memory_file(),
            profiles_file: default_profiles_file(),
            history_window: default_history_window(),
        }
    }
}

// ============= LLM Configuration =============

/// Provider selection, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Local Ollama server
    Ollama {
        /// Server URL without the `/v1` suffix
        #[serde(default = "default_ollama_url")]
        base_url: String,
        /// Model tag
        model: String,
    },
    /// OpenAI or a compatible gateway
    OpenAI {
        /// Environment variable containing API key
        #[serde(default = "default_openai_key_env")]
        api_key_env: String,
        /// Base URL including `/v1`
        #[serde(default = "default_openai_base")]
        api_base: String,
        /// Model name
        model: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

/// Provider plus request options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Which provider to call
    #[serde(flatten)]
    pub provider: ProviderConfig,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::OpenAI {
                api_key_env: default_openai_key_env(),
                api_base: default_openai_base(),
                model: "gpt-4o-mini".to_string(),
            },
            temperature: 0.0,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Options passed to every client built from this section.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            temperature: self.temperature,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

// ============= Orchestration Configuration =============

/// Limits and fallback text for the routing hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Routing calls allowed per turn
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,

    /// Step count from which routing prompts push for FINISH
    #[serde(default = "default_finish_hint_after")]
    pub finish_hint_after: u32,

    /// Model round trips allowed per worker turn
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,

    /// Answer given when routing fails
    #[serde(default = "default_apology_message")]
    pub apology_message: String,
}

fn default_max_hops() -> u32 {
    20
}

fn default_finish_hint_after() -> u32 {
    10
}

fn default_max_tool_iterations() -> usize {
    5
}

fn default_apology_message() -> String {
    DEFAULT_APOLOGY.to_string()
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            finish_hint_after: default_finish_hint_after(),
            max_tool_iterations: default_max_tool_iterations(),
            apology_message: default_apology_message(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File does not exist
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// File could not be read
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// File is not valid TOML
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value is out of range or inconsistent
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Referenced environment variable is unset
    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(err: ConfigError) -> Self {
        crate::types::AppError::Configuration(err.to_string())
    }
}

impl MedrouteConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: MedrouteConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate limits and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestration.max_hops == 0 {
            return Err(ConfigError::ValidationError(
                "orchestration.max_hops must be at least 1".to_string(),
            ));
        }
        if self.orchestration.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "orchestration.max_tool_iterations must be at least 1".to_string(),
            ));
        }
        if self.orchestration.apology_message.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "orchestration.apology_message must not be empty".to_string(),
            ));
        }
        if self.memory.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "memory.history_window must be at least 1".to_string(),
            ));
        }

        match &self.llm.provider {
            ProviderConfig::OpenAI {
                api_key_env, model, ..
            } => {
                self.validate_env_var(api_key_env)?;
                validate_model(model)?;
            }
            ProviderConfig::Ollama { model, .. } => validate_model(model)?,
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Resolve the configured provider, reading its API key from the environment
    pub fn provider(&self) -> Result<Provider, ConfigError> {
        match &self.llm.provider {
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
                model,
            } => Ok(Provider::OpenAI {
                api_key: self
                    .resolve_env(api_key_env)
                    .ok_or_else(|| ConfigError::MissingEnvVar(api_key_env.clone()))?,
                api_base: api_base.clone(),
                model: model.clone(),
            }),
            ProviderConfig::Ollama { base_url, model } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                model: model.clone(),
            }),
        }
    }
}

fn validate_model(model: &str) -> Result<(), ConfigError> {
    if model.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "llm.model must not be empty".to_string(),
        ));
    }
    Ok(())
}
