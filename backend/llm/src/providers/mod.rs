pub mod mock;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use aquadash_config::{LlmConfig, LlmProviderKind};
use aquadash_core::LlmProvider;

use mock::ScriptedProvider;
use openai::OpenAiCompatProvider;

/// Build the provider selected by the `llm` config section.
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider {
        LlmProviderKind::Openai => {
            let base_url = config
                .base_url
                .clone()
                .context("llm.baseUrl is required for the openai provider")?;
            let provider = OpenAiCompatProvider::new(
                base_url,
                config.api_key.clone(),
                Duration::from_secs(config.connect_timeout_secs),
            )?;
            info!(base_url = %provider.base_url(), "Using OpenAI-compatible provider");
            Ok(Arc::new(provider))
        }
        LlmProviderKind::Mock => {
            info!("Using scripted mock provider");
            Ok(Arc::new(ScriptedProvider::canned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_each_provider_kind() {
        let mut cfg = LlmConfig {
            provider: LlmProviderKind::Mock,
            ..Default::default()
        };
        assert_eq!(build_provider(&cfg).unwrap().name(), "mock");

        cfg.provider = LlmProviderKind::Openai;
        assert!(build_provider(&cfg).is_err());

        cfg.base_url = Some("http://127.0.0.1:9/v1".into());
        assert_eq!(build_provider(&cfg).unwrap().name(), "openai");
    }
}
