//! aquadash configuration schema.
//!
//! Every section deserializes with defaults so a partial (or absent) YAML
//! file yields a runnable configuration.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AquadashConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub wework: WeworkConfig,
    pub logging: LoggingConfig,
    pub data: DataConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Externally reachable base URL, used to build OAuth redirect URIs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    /// Built dashboard bundle served for every non-API path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,
    /// Marks cookies `Secure`.
    pub production: bool,
    pub insight_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
            public_url: None,
            static_dir: None,
            production: false,
            insight_path: "/api/ai-insight".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

// ---------------------------------------------------------------------------
// Language model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    /// Any OpenAI-compatible `/chat/completions` endpoint.
    #[default]
    Openai,
    /// Offline scripted provider.
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub connect_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            base_url: None,
            api_key: None,
            model: "doubao-seed-1-6-251015".to_string(),
            temperature: 0.7,
            connect_timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Enterprise chat (WeWork)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WeworkConfig {
    /// Require enterprise-chat login for `/gm` pages.
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corp_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub api_base: String,
    pub sso_base: String,
    pub token_refresh_margin_secs: u64,
}

impl Default for WeworkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            corp_id: None,
            agent_id: None,
            secret: None,
            api_base: "https://qyapi.weixin.qq.com".to_string(),
            sso_base: "https://open.work.weixin.qq.com/wwopen/sso/qrConnect".to_string(),
            token_refresh_margin_secs: 300,
        }
    }
}

impl WeworkConfig {
    /// True when all credentials needed to call the API are present.
    pub fn has_credentials(&self) -> bool {
        [&self.corp_id, &self.agent_id, &self.secret]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

// ---------------------------------------------------------------------------
// Logging / data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for daily-rolling NDJSON logs; console only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// JSON console output instead of human-readable lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DataConfig {
    /// JSON array of projects loaded into the in-memory store at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_file: Option<String>,
}
