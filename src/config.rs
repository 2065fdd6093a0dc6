//! Configuration loading and management.
//!
//! Configuration is loaded from multiple sources with the following precedence
//! (highest to lowest):
//!
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. `.sql-agent.toml` in current directory
//! 4. `~/.config/sql-agent/config.toml`
//! 5. Default values
//!
//! # Configuration File Format
//!
//! ```toml
//! [llm]
//! provider = "openai"          # openai, anthropic, ollama
//! model = "gpt-4o-mini"
//! api_key = "sk-..."           # or use LLM_API_KEY env var
//! base_url = "http://localhost:1234/v1"
//!
//! [retry]
//! max_retries = 3
//! initial_delay_ms = 1000
//!
//! [database]
//! path = "test.db"
//! timeout_ms = 5000
//! read_only = true
//!
//! [guard]
//! default_limit = 50
//! strict = false
//!
//! [inference]
//! central_entity = "player"
//!
//! [diagram]
//! include_columns = true
//! max_columns = 12
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `LLM_API_KEY` | API key for OpenAI/Anthropic |
//! | `LLM_PROVIDER` | Provider name |
//! | `LLM_MODEL` | Model identifier |
//! | `OLLAMA_URL` | Ollama base URL |
//! | `OPENAI_API_BASE` | OpenAI-compatible endpoint |
//! | `SQLITE_PATH` | Database file |
//! | `SQL_AGENT_DEFAULT_LIMIT` | Row limit appended to generated queries |

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration
};

use serde::Deserialize;

use crate::error::{AppResult, config_error};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm:       LlmConfig,
    #[serde(default)]
    pub retry:     RetryConfig,
    #[serde(default)]
    pub database:  DatabaseConfig,
    #[serde(default)]
    pub guard:     GuardConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub diagram:   DiagramConfig
}

/// LLM provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub provider:   Option<String>,
    pub api_key:    Option<String>,
    pub model:      Option<String>,
    pub ollama_url: Option<String>,
    /// OpenAI-compatible endpoint (LM Studio, vLLM, proxies)
    pub base_url:   Option<String>
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider:   None,
            api_key:    None,
            model:      None,
            ollama_url: Some(String::from("http://localhost:11434")),
            base_url:   None
        }
    }
}

/// Retry configuration for LLM requests
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries:      u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms:     u64,
    pub backoff_factor:   f64
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries:      3,
            initial_delay_ms: 1000,
            max_delay_ms:     30000,
            backoff_factor:   2.0
        }
    }
}

/// Connection target for catalog introspection and query execution.
///
/// Threaded explicitly into every catalog call; there is no process-wide
/// default connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path:                PathBuf,
    /// Deadline for a single query execution
    pub timeout_ms:          u64,
    /// Open connections read-only and enable `query_only`
    pub read_only:           bool,
    /// Tables whose name starts with this prefix are hidden from the catalog
    pub system_table_prefix: String
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path:                PathBuf::from("test.db"),
            timeout_ms:          5000,
            read_only:           true,
            system_table_prefix: String::from("sqlite_")
        }
    }
}

impl DatabaseConfig {
    /// Configuration for a database file with default settings
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Guardrail settings for generated SQL
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Row limit appended to statements without a `LIMIT` clause
    pub default_limit: u64,
    /// Skip leading comments and require exactly one parseable query
    pub strict:        bool
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            strict:        false
        }
    }
}

/// Relationship inference settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Singular name of the entity most other tables point at.
    /// An empty string disables central entity linking.
    pub central_entity: String
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            central_entity: String::from("player")
        }
    }
}

/// Diagram rendering settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
    /// Render per-table field lists
    pub include_columns: bool,
    /// Maximum fields per table node, `0` for no limit
    pub max_columns:     usize,
    /// Draw inferred edges dashed
    pub dashed_inferred: bool
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            include_columns: true,
            max_columns:     12,
            dashed_inferred: false
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file in current directory (.sql-agent.toml)
    /// 3. Config file in home directory (~/.config/sql-agent/config.toml)
    /// 4. Default values
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(home) = env::var_os("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("sql-agent")
                .join("config.toml");

            if home_config.exists() {
                config = Self::from_file(&home_config)?;
            }
        }

        let local_config = PathBuf::from(".sql-agent.toml");
        if local_config.exists() {
            config = Self::from_file(&local_config)?;
        }

        config.apply_env()?;
        Ok(config)
    }

    /// Parse a single TOML configuration file
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| config_error(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("Invalid config file: {}", e)))
    }

    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(api_key) = env::var("LLM_API_KEY") {
            self.llm.api_key = Some(api_key);
        }

        if let Ok(provider) = env::var("LLM_PROVIDER") {
            self.llm.provider = Some(provider);
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            self.llm.model = Some(model);
        }

        if let Ok(url) = env::var("OLLAMA_URL") {
            self.llm.ollama_url = Some(url);
        }

        if let Ok(url) = env::var("OPENAI_API_BASE") {
            self.llm.base_url = Some(url);
        }

        if let Some(path) = env::var_os("SQLITE_PATH") {
            self.database.path = PathBuf::from(path);
        }

        if let Ok(limit) = env::var("SQL_AGENT_DEFAULT_LIMIT") {
            self.guard.default_limit = limit.trim().parse().map_err(|_| {
                config_error(format!(
                    "SQL_AGENT_DEFAULT_LIMIT must be a positive integer, got '{}'",
                    limit
                ))
            })?;
        }

        Ok(())
    }
}
