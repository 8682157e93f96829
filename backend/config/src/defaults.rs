//! Config defaults that depend on other fields.

use crate::schema::{AquadashConfig, LlmProviderKind};

/// OpenAI-compatible endpoint of the Volcengine Ark platform serving Doubao models.
pub const DEFAULT_LLM_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";

/// Apply all derived defaults to a freshly loaded config.
pub fn apply_all_defaults(config: AquadashConfig) -> AquadashConfig {
    let config = apply_server_defaults(config);
    apply_llm_defaults(config)
}

/// Derive `publicUrl` from the port and make the insight path absolute.
fn apply_server_defaults(mut config: AquadashConfig) -> AquadashConfig {
    let server = &mut config.server;
    if server.public_url.is_none() {
        server.public_url = Some(format!("http://localhost:{}", server.port));
    }
    if let Some(url) = &mut server.public_url {
        while url.ends_with('/') {
            url.pop();
        }
    }
    if !server.insight_path.starts_with('/') {
        server.insight_path.insert(0, '/');
    }
    config
}

fn apply_llm_defaults(mut config: AquadashConfig) -> AquadashConfig {
    if config.llm.provider == LlmProviderKind::Openai && config.llm.base_url.is_none() {
        config.llm.base_url = Some(DEFAULT_LLM_BASE_URL.to_string());
    }
    config
}
