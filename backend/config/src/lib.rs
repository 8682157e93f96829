//! `aquadash-config`: cockpit configuration management.
//!
//! Provides:
//! - Typed config schema (server, language model, WeWork, logging, data)
//! - YAML loading
//! - `${ENV_VAR}` substitution and well-known env overrides
//! - Derived defaults
//! - Validation
//! - Redaction for safe logging

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{apply_env_overrides, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_file_path, load_raw, parse_config};
pub use redact::redact;
pub use schema::{
    AquadashConfig, DataConfig, LlmConfig, LlmProviderKind, LoggingConfig, ServerConfig,
    WeworkConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Load, substitute env vars, apply overrides and defaults, then validate.
///
/// Validation errors abort; warnings are logged.
pub async fn load_and_prepare(path: &Path) -> Result<AquadashConfig> {
    let env: HashMap<String, String> = std::env::vars().collect();
    let raw = load_raw(path).await?;
    prepare(raw, &env)
}

/// The pure part of [`load_and_prepare`], separated for testing.
pub fn prepare(
    raw: Option<serde_json::Value>,
    env: &HashMap<String, String>,
) -> Result<AquadashConfig> {
    let mut config = match raw {
        Some(value) => {
            let value = resolve_env_vars_with(&value, env)
                .context("Failed to resolve env vars in config")?;
            parse_config(value)?
        }
        None => AquadashConfig::default(),
    };

    apply_env_overrides(&mut config, env);
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if let Some(first) = report.errors.first() {
        for error in &report.errors {
            tracing::error!(path = %error.path, message = %error.message, "Config error");
        }
        bail!("invalid configuration: {first}");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prepare_runs_full_pipeline() {
        let raw = json!({"llm": {"apiKey": "${ARK_KEY}"}, "server": {"port": 7000}});
        let env: HashMap<String, String> = [("ARK_KEY".to_string(), "ak-9".to_string())]
            .into_iter()
            .collect();
        let cfg = prepare(Some(raw), &env).unwrap();
        assert_eq!(cfg.llm.api_key.as_deref(), Some("ak-9"));
        assert_eq!(cfg.server.public_url.as_deref(), Some("http://localhost:7000"));
    }

    #[test]
    fn prepare_rejects_invalid_config() {
        let raw = json!({"wework": {"enabled": true}});
        let err = prepare(Some(raw), &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("wework"));
    }
}
