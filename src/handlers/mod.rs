//! HTTP request handlers for the Sketchmind API

use crate::cache::{ContentCache, TtlCache};
use crate::config::Config;
use crate::error::AppResult;
use crate::metrics::Metrics;
use crate::pipeline::Pipeline;
use crate::provider::{LlmExecutor, ProviderClient};
use std::sync::Arc;
use std::time::Duration;

pub mod generate;
pub mod health;
pub mod metrics;

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pipeline: Arc<Pipeline>,
    metrics: Metrics,
}

impl AppState {
    /// Create state from configuration, wiring the real provider client
    ///
    /// # Errors
    /// Fails when the provider credential is missing or metrics
    /// registration fails.
    pub fn new(config: Arc<Config>) -> AppResult<Self> {
        let metrics = Metrics::new().map_err(|e| {
            crate::error::AppError::Internal(format!("metrics registration failed: {}", e))
        })?;
        let executor: Arc<dyn LlmExecutor> = Arc::new(
            ProviderClient::from_config(config.provider())?.with_metrics(metrics.clone()),
        );
        let cache: Arc<dyn ContentCache> = Arc::new(TtlCache::new(Duration::from_secs(
            config.pipeline().cache_ttl_seconds(),
        )));
        Ok(Self::with_parts(config, executor, cache, metrics))
    }

    /// Create state from explicit parts (used by tests to inject fakes)
    pub fn with_parts(
        config: Arc<Config>,
        executor: Arc<dyn LlmExecutor>,
        cache: Arc<dyn ContentCache>,
        metrics: Metrics,
    ) -> Self {
        let pipeline =
            Arc::new(Pipeline::new(&config, executor, cache).with_metrics(metrics.clone()));
        Self {
            config,
            pipeline,
            metrics,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
