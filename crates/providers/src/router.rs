//! Provider selection from configuration.

use std::sync::Arc;
use stepwise_config::AppConfig;
use stepwise_core::error::ProviderError;
use stepwise_core::provider::Provider;
use tracing::debug;

use crate::openai_compat::OpenAiCompatProvider;

/// Providers that run locally and need no API key.
const KEYLESS_PROVIDERS: &[&str] = &["ollama", "vllm", "llamacpp", "llama.cpp"];

/// Build the configured provider.
///
/// `api_url` overrides the well-known base URL. A hosted provider without an
/// API key is reported as not configured instead of failing on first call.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.default_provider.as_str();
    let base_url = config
        .api_url
        .clone()
        .or_else(|| default_base_url(name))
        .ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "unknown provider '{name}'; set api_url for custom endpoints"
            ))
        })?;

    let api_key = match &config.api_key {
        Some(key) => key.clone(),
        None if KEYLESS_PROVIDERS.contains(&name) || config.api_url.is_some() => String::new(),
        None => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for '{name}'; set STEPWISE_API_KEY or api_key in config.toml"
            )));
        }
    };

    debug!(provider = %name, base_url = %base_url, "Provider configured");
    Ok(Arc::new(OpenAiCompatProvider::new(name, base_url, api_key)?))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "openai" => "https://api.openai.com/v1",
        "ollama" => "http://localhost:11434/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "vllm" => "http://localhost:8000/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url.into())
}
