//! Log Redaction
//!
//! Scrubs credentials from strings (mostly upstream URLs and error bodies)
//! before they are logged. WeWork passes its access token and corp secret as
//! query parameters, so URLs are never logged raw.

use regex::Regex;
use std::sync::LazyLock;

static QUERY_SECRET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(access_token|corpsecret|secret|api_key)=[^&\s]+").expect("valid regex")
});
static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[a-zA-Z0-9\-\._~+/]+=*").expect("valid regex"));
static API_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bsk-[a-zA-Z0-9]{20,}").expect("valid regex"));

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = QUERY_SECRET_RE.replace_all(input, "$1=[REDACTED]");
    let redacted = BEARER_RE.replace_all(&redacted, "Bearer [REDACTED]");
    API_KEY_RE.replace_all(&redacted, "[REDACTED_KEY]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_query_tokens() {
        let raw = "https://qyapi.weixin.qq.com/cgi-bin/message/send?access_token=abcDEF123&debug=1";
        let clean = redact_sensitive_data(raw);
        assert_eq!(
            clean,
            "https://qyapi.weixin.qq.com/cgi-bin/message/send?access_token=[REDACTED]&debug=1"
        );
        let raw = "/cgi-bin/gettoken?corpid=ww1&corpsecret=topsecret";
        assert!(!redact_sensitive_data(raw).contains("topsecret"));
    }

    #[test]
    fn redacts_bearer_and_api_keys() {
        let raw = "auth: Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9 key sk-abcdefghijklmnopqrstuvwx";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("eyJhbGci"));
        assert!(!clean.contains("sk-abcdef"));
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(redact_sensitive_data("高风险项目占比35%"), "高风险项目占比35%");
    }
}
