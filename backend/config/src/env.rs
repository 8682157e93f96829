//! Environment handling for config values.
//!
//! Two mechanisms:
//! - `${VAR_NAME}` references inside string values, resolved at load time
//!   (`$${VAR}` escapes to a literal `${VAR}`);
//! - well-known variables (`AQUADASH_PORT`, `WEWORK_SECRET`, ...) that
//!   override the parsed file.

use std::collections::HashMap;

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::schema::{AquadashConfig, LlmProviderKind};

/// `$${VAR}` or `${VAR}`; group 1 is the escape marker.
static ENV_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env ref regex"));

#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references using the process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute `${VAR}` references using the given map.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute(value, env, "")
}

fn substitute(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_str(s, env, path)?)),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| substitute(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let child = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                out.insert(k.clone(), substitute(v, env, &child)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_str(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains("${") {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let out = ENV_REF.replace_all(s, |caps: &regex::Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{name}}}");
        }
        match env.get(name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(out.into_owned())
}

/// Apply well-known environment variables on top of the parsed file.
pub fn apply_env_overrides(config: &mut AquadashConfig, env: &HashMap<String, String>) {
    let get = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();

    if let Some(bind) = get("AQUADASH_BIND") {
        config.server.bind = bind;
    }
    if let Some(port) = get("AQUADASH_PORT") {
        match port.parse() {
            Ok(p) => config.server.port = p,
            Err(_) => warn!(value = %port, "Ignoring invalid AQUADASH_PORT"),
        }
    }
    if let Some(url) = get("AQUADASH_PUBLIC_URL") {
        config.server.public_url = Some(url);
    }
    if let Some(dir) = get("AQUADASH_STATIC_DIR") {
        config.server.static_dir = Some(dir);
    }

    if let Some(provider) = get("LLM_PROVIDER") {
        match provider.as_str() {
            "openai" => config.llm.provider = LlmProviderKind::Openai,
            "mock" => config.llm.provider = LlmProviderKind::Mock,
            other => warn!(value = %other, "Ignoring unknown LLM_PROVIDER"),
        }
    }
    if let Some(url) = get("LLM_BASE_URL") {
        config.llm.base_url = Some(url);
    }
    if let Some(key) = get("LLM_API_KEY") {
        config.llm.api_key = Some(key);
    }
    if let Some(model) = get("LLM_MODEL") {
        config.llm.model = model;
    }

    if let Some(enabled) = get("WEWORK_ENABLED") {
        config.wework.enabled = enabled == "true";
    }
    if let Some(v) = get("WEWORK_CORPID") {
        config.wework.corp_id = Some(v);
    }
    if let Some(v) = get("WEWORK_AGENT_ID") {
        config.wework.agent_id = Some(v);
    }
    if let Some(v) = get("WEWORK_SECRET") {
        config.wework.secret = Some(v);
    }

    if let Some(level) = get("RUST_LOG") {
        config.logging.level = level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_nested_references() {
        let v = json!({"llm": {"apiKey": "${ARK_API_KEY}"}, "tags": ["${REGION}-east"]});
        let out =
            resolve_env_vars_with(&v, &env(&[("ARK_API_KEY", "ak-1"), ("REGION", "cn")])).unwrap();
        assert_eq!(out["llm"]["apiKey"], "ak-1");
        assert_eq!(out["tags"][0], "cn-east");
    }

    #[test]
    fn missing_var_names_path() {
        let v = json!({"wework": {"secret": "${WEWORK_SECRET}"}});
        let err = resolve_env_vars_with(&v, &HashMap::new()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("WEWORK_SECRET"));
        assert!(msg.contains("wework.secret"));
    }

    #[test]
    fn escaped_reference_is_kept_literally() {
        let v = json!({"note": "$${NOT_A_VAR}"});
        let out = resolve_env_vars_with(&v, &HashMap::new()).unwrap();
        assert_eq!(out["note"], "${NOT_A_VAR}");
    }

    #[test]
    fn overrides_apply_on_top_of_file() {
        let mut cfg = AquadashConfig::default();
        apply_env_overrides(
            &mut cfg,
            &env(&[
                ("AQUADASH_PORT", "7070"),
                ("LLM_PROVIDER", "mock"),
                ("WEWORK_ENABLED", "true"),
                ("WEWORK_CORPID", "ww-corp"),
            ]),
        );
        assert_eq!(cfg.server.port, 7070);
        assert_eq!(cfg.llm.provider, LlmProviderKind::Mock);
        assert!(cfg.wework.enabled);
        assert_eq!(cfg.wework.corp_id.as_deref(), Some("ww-corp"));
    }

    #[test]
    fn invalid_port_override_is_ignored() {
        let mut cfg = AquadashConfig::default();
        apply_env_overrides(&mut cfg, &env(&[("AQUADASH_PORT", "lots")]));
        assert_eq!(cfg.server.port, 5000);
    }
}
