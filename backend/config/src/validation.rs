//! Config validation: field checks with user-friendly messages.

use crate::schema::{AquadashConfig, LlmProviderKind};
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Lifetime of a WeWork access token; the refresh margin must leave room in it.
const WEWORK_TOKEN_LIFETIME_SECS: u64 = 7200;

pub fn validate(config: &AquadashConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_llm(config, &mut report);
    validate_wework(config, &mut report);
    report
}

fn validate_server(config: &AquadashConfig, report: &mut ValidationReport) {
    if config.server.port == 0 {
        report.error("server.port", "port must be > 0");
    }
    if let Some(url) = &config.server.public_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            report.error("server.publicUrl", "publicUrl must start with http:// or https://");
        }
    }
}

fn validate_llm(config: &AquadashConfig, report: &mut ValidationReport) {
    let llm = &config.llm;
    if !(0.0..=2.0).contains(&llm.temperature) {
        report.error("llm.temperature", "temperature must be within [0, 2]");
    }
    if llm.model.trim().is_empty() {
        report.error("llm.model", "model cannot be empty");
    }
    if llm.provider == LlmProviderKind::Openai {
        if llm.base_url.as_deref().map_or(true, str::is_empty) {
            report.error("llm.baseUrl", "baseUrl is required for the openai provider");
        }
        if llm.api_key.as_deref().map_or(true, str::is_empty) {
            report.warn("llm.apiKey", "No API key configured; insight requests will likely be rejected upstream");
        }
    }
}

fn validate_wework(config: &AquadashConfig, report: &mut ValidationReport) {
    let wework = &config.wework;
    if wework.enabled && !wework.has_credentials() {
        report.error(
            "wework",
            "corpId, agentId and secret are required when enterprise login is enabled",
        );
    } else if !wework.enabled && !wework.has_credentials() {
        if wework.corp_id.is_some() || wework.secret.is_some() {
            report.warn("wework", "Incomplete WeWork credentials; notifications are disabled");
        }
    }
    if wework.token_refresh_margin_secs >= WEWORK_TOKEN_LIFETIME_SECS {
        report.error(
            "wework.tokenRefreshMarginSecs",
            format!("tokenRefreshMarginSecs must be below the {WEWORK_TOKEN_LIFETIME_SECS}s token lifetime"),
        );
    }
}
