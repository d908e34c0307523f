// Ideaflow - blog idea generation workflow
// License: Apache-2.0

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("home directory not found")]
    NoHomeDir,
    #[error("invalid model api_base '{url}': {reason}")]
    InvalidApiBase { url: String, reason: String },
    #[error("model name must not be empty")]
    EmptyModel,
    #[error("workflow.max_active_tasks must be at least 1")]
    ZeroConcurrency,
}

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Connection and sampling settings for the OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Local model servers accept requests without a key.
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// How many times a malformed structured reply is sent back to the model.
    #[serde(default = "default_output_retries")]
    pub output_retries: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            api_base: default_api_base(),
            api_key: String::new(),
            temperature: None,
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            output_retries: default_output_retries(),
        }
    }
}

fn default_model_name() -> String {
    "llama3.2".to_string()
}
fn default_api_base() -> String {
    "http://localhost:11434/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> usize {
    2
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_output_retries() -> usize {
    1
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_dag_id")]
    pub dag_id: String,
    /// Upper bound on concurrently running fan-out instances.
    #[serde(default = "default_max_active_tasks")]
    pub max_active_tasks: usize,
    /// Overrides the built-in product list when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<String>>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            dag_id: default_dag_id(),
            max_active_tasks: default_max_active_tasks(),
            products: None,
        }
    }
}

fn default_dag_id() -> String {
    "ollama_blog_idea_generation".to_string()
}
fn default_max_active_tasks() -> usize {
    16
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when the
    /// file does not exist. Environment overrides apply in both cases.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from `path`, or from the default location when none is given.
    /// Read and parse failures are errors; only a missing file means defaults.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path().unwrap_or_else(|_| PathBuf::from("config.json")),
        };
        Self::load(&path)
    }

    /// Apply `IDEAFLOW_*` overrides from the given lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("IDEAFLOW_MODEL_NAME") {
            self.model.name = v;
        }
        if let Some(v) = lookup("IDEAFLOW_MODEL_API_BASE") {
            self.model.api_base = v;
        }
        if let Some(v) = lookup("IDEAFLOW_MODEL_API_KEY") {
            self.model.api_key = v;
        }
        if let Some(v) = lookup("IDEAFLOW_WORKFLOW_MAX_ACTIVE_TASKS") {
            match v.parse() {
                Ok(n) => self.workflow.max_active_tasks = n,
                Err(_) => tracing::warn!(
                    value = %v,
                    "Ignoring non-numeric IDEAFLOW_WORKFLOW_MAX_ACTIVE_TASKS"
                ),
            }
        }
    }

    /// Get the default config file path: ~/.ideaflow/config.json
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".ideaflow").join("config.json"))
    }

    /// Validate configuration for basic correctness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.name.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }

        let parsed =
            url::Url::parse(&self.model.api_base).map_err(|e| ConfigError::InvalidApiBase {
                url: self.model.api_base.clone(),
                reason: e.to_string(),
            })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidApiBase {
                url: self.model.api_base.clone(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        if self.workflow.max_active_tasks == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
