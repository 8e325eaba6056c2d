//! Configuration management for Sketchmind
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Fields are private where invariants matter: configuration is loaded via
//! deserialization, checked by `Config::validate()`, and cannot be mutated
//! afterward.

use crate::error::{AppError, AppResult};
use crate::router::Protocol;
use crate::types::DiagramType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    server: ServerConfig,
    provider: ProviderConfig,
    models: ModelsConfig,
    #[serde(default)]
    pipeline: PipelineConfig,
    #[serde(default)]
    observability: ObservabilityConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field invariants that serde cannot express
    pub fn validate(&self) -> AppResult<()> {
        if self.provider.base_url.trim().is_empty() {
            return Err(AppError::Config(
                "provider.base_url must not be empty".to_string(),
            ));
        }
        if self.provider.api_key_env.trim().is_empty() {
            return Err(AppError::Config(
                "provider.api_key_env must name an environment variable".to_string(),
            ));
        }
        if self.provider.request_timeout_seconds == 0 || self.provider.request_timeout_seconds > 300
        {
            return Err(AppError::Config(format!(
                "provider.request_timeout_seconds must be in (0, 300], got {}",
                self.provider.request_timeout_seconds
            )));
        }
        for (tier, model) in [("fast", &self.models.fast), ("deep", &self.models.deep)] {
            if model.id.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "models.{}.id must not be empty",
                    tier
                )));
            }
        }
        Ok(())
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn models(&self) -> &ModelsConfig {
        &self.models
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    pub fn observability(&self) -> &ObservabilityConfig {
        &self.observability
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Provider endpoint configuration
///
/// The bearer credential is never stored in the file; the file names the
/// environment variable holding it. A missing credential is a fatal
/// configuration error at request time, not a retryable one.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    base_url: String,
    api_key_env: String,
    #[serde(default = "default_request_timeout")]
    request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    45
}

impl ProviderConfig {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve the bearer credential from the environment
    pub fn api_key(&self) -> AppResult<String> {
        std::env::var(&self.api_key_env).map_err(|_| {
            AppError::Config(format!(
                "Provider credential missing: environment variable {} is not set",
                self.api_key_env
            ))
        })
    }

    pub fn request_timeout_seconds(&self) -> u64 {
        self.request_timeout_seconds
    }
}

/// Model tier configuration
///
/// Two tiers: `fast` for classification and short queries, `deep` for
/// longer content/diagram/unified work.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsConfig {
    fast: ModelConfig,
    deep: ModelConfig,
}

impl ModelsConfig {
    pub fn fast(&self) -> &ModelConfig {
        &self.fast
    }

    pub fn deep(&self) -> &ModelConfig {
        &self.deep
    }
}

/// A single model tier entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    id: String,
    protocol: Protocol,
}

impl ModelConfig {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }
}

/// Classifier implementation selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierStrategy {
    /// Zero-latency keyword heuristic (no network round trip)
    #[default]
    Heuristic,
    /// Single-word LLM classification with a tiny token budget
    Llm,
}

/// Pipeline tuning knobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default)]
    classifier: ClassifierStrategy,
    #[serde(default = "default_cache_ttl")]
    cache_ttl_seconds: u64,
    #[serde(default = "default_short_query_threshold")]
    short_query_threshold: usize,
    /// Optional deployment-wide diagram type override; when set, the
    /// classifier is skipped entirely
    #[serde(default)]
    diagram_type_override: Option<DiagramType>,
}

fn default_cache_ttl() -> u64 {
    120
}

fn default_short_query_threshold() -> usize {
    48
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierStrategy::default(),
            cache_ttl_seconds: default_cache_ttl(),
            short_query_threshold: default_short_query_threshold(),
            diagram_type_override: None,
        }
    }
}

impl PipelineConfig {
    pub fn classifier(&self) -> ClassifierStrategy {
        self.classifier
    }

    pub fn cache_ttl_seconds(&self) -> u64 {
        self.cache_ttl_seconds
    }

    pub fn short_query_threshold(&self) -> usize {
        self.short_query_threshold
    }

    pub fn diagram_type_override(&self) -> Option<DiagramType> {
        self.diagram_type_override
    }
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
