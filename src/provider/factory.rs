// Ideaflow - Provider factory

use super::{http::HTTPProvider, LLMProvider};
use crate::config::Config;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

/// Create an LLM provider from the loaded config.
pub fn create_provider(cfg: &Config) -> anyhow::Result<Box<dyn LLMProvider>> {
    let provider = HTTPProvider::new(
        cfg.model.api_key.clone(),
        cfg.model.api_base.clone(),
        cfg.model.name.clone(),
        Duration::from_secs(cfg.model.timeout_secs),
    )?;

    tracing::info!(
        model = %provider.default_model(),
        api_base = %provider.api_base(),
        authenticated = !cfg.model.api_key.is_empty(),
        "Created LLM provider"
    );

    Ok(Box::new(provider))
}

/// Per-request options derived from the model config: sampling parameters
/// that go into the request body, plus the client's own retry settings.
pub fn request_options(cfg: &Config) -> HashMap<String, serde_json::Value> {
    let mut options = HashMap::new();
    options.insert("max_retries".to_string(), json!(cfg.model.max_retries));
    options.insert("retry_delay_ms".to_string(), json!(cfg.model.retry_delay_ms));
    if let Some(t) = cfg.model.temperature {
        options.insert("temperature".to_string(), json!(t));
    }
    if let Some(n) = cfg.model.max_tokens {
        options.insert("max_tokens".to_string(), json!(n));
    }
    options
}
