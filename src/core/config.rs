//! Configuration management for Stepwise
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/stepwise/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::agent::SynthesisMode;
use crate::core::error::{Result, StepwiseError};

/// Highest score the score-threshold termination policy understands
pub const MAX_SCORE: u8 = 5;

/// Main configuration for Stepwise
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion API configuration
    pub api: ApiConfig,
    /// Model configuration
    pub models: ModelConfig,
    /// Structured extraction configuration
    pub extraction: ExtractionConfig,
    /// Agent loop configuration
    pub agent: AgentConfig,
}

/// Completion API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API key sent as a bearer token
    pub api_key: String,
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Model configuration, one per agent role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model used to write responses
    pub chat: String,
    /// Model used to select tools
    pub tool_selector: String,
    /// Model used to judge whether a response is final
    pub evaluator: String,
    /// Sampling temperature for free-text responses
    pub temperature: Option<f32>,
}

/// Structured extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Attempts before an extraction is reported as failed
    pub max_retries: u32,
    /// Sampling temperature for extraction calls
    pub temperature: f32,
}

/// How the loop decides that a response is final
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminationMode {
    /// Model returns a yes/no judgment
    Judgment,
    /// Model returns a 0-5 score compared against `min_score`
    Score,
}

/// Agent loop behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Hard ceiling on loop steps
    /// Default: 3
    pub max_steps: usize,
    /// Termination policy
    pub termination: TerminationMode,
    /// Minimum score to stop when `termination = "score"`
    /// Default: 3
    pub min_score: u8,
    /// How responses are synthesized
    pub synthesis: SynthesisMode,
    /// Whether to show debug output
    pub debug: bool,
    /// System prompt prepended to every conversation
    pub system_prompt: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            models: ModelConfig::default(),
            extraction: ExtractionConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            timeout_secs: 120,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Self {
            chat: model.clone(),
            tool_selector: model.clone(),
            evaluator: model,
            temperature: None,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            temperature: 0.0,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: env::var("STEPWISE_MAX_STEPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            termination: TerminationMode::Judgment,
            min_score: 3,
            synthesis: SynthesisMode::default(),
            debug: env::var("STEPWISE_DEBUG")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            system_prompt: None,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stepwise")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::load_or_default(&Self::config_file())
    }

    /// Load `path` if it exists, falling back to defaults (which respect env vars)
    ///
    /// A file that exists but cannot be read or parsed is logged and skipped.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), "Ignoring config file, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Load configuration from a file only
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| StepwiseError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)
            .map_err(|e| StepwiseError::config(format!("Failed to parse config: {}", e)))?;

        // Keep secrets out of the file when the environment provides them
        if config.api.api_key.is_empty() {
            config.api.api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        }

        Ok(config)
    }

    /// Check the values the agent loop relies on
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_steps == 0 {
            return Err(StepwiseError::config("agent.max_steps must be at least 1"));
        }
        if self.extraction.max_retries == 0 {
            return Err(StepwiseError::config(
                "extraction.max_retries must be at least 1",
            ));
        }
        if self.agent.min_score > MAX_SCORE {
            return Err(StepwiseError::config(format!(
                "agent.min_score must be between 0 and {}",
                MAX_SCORE
            )));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(StepwiseError::config("api.base_url must not be empty"));
        }
        Ok(())
    }

    /// Use one model for every role
    pub fn set_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        self.models.chat = model.clone();
        self.models.tool_selector = model.clone();
        self.models.evaluator = model;
    }

    /// Chat completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api.base_url.trim_end_matches('/'))
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let mut config = Config::default();
        config.api.api_key.clear();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}
