//! Shared utility functions for provider adapters.

use cq_domain::config::ProviderConfig;
use cq_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key for a provider.
///
/// Precedence:
/// 1. `api_key` field (plaintext — warn)
/// 2. `api_key_env` (reads that environment variable)
/// 3. the family's default environment variable
pub(crate) fn resolve_api_key(cfg: &ProviderConfig) -> Result<String> {
    if let Some(ref key) = cfg.api_key {
        tracing::warn!(
            provider = %cfg.id,
            "API key loaded from plaintext config field 'api_key' — prefer 'api_key_env'"
        );
        return Ok(key.clone());
    }

    let env_var = cfg
        .api_key_env
        .clone()
        .unwrap_or_else(|| cfg.kind.default_key_env().to_owned());
    std::env::var(&env_var).map_err(|_| {
        Error::Auth(format!(
            "provider '{}': environment variable '{}' not set",
            cfg.id, env_var
        ))
    })
}

/// Best-effort extraction of `error.message` from a provider error body.
/// Falls back to the raw body when it is not the expected JSON shape.
pub(crate) fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Mask substrings that look like API keys or bearer tokens in an error
/// message, so raw secrets never reach logs.
pub(crate) fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..]);
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use cq_domain::config::ProviderKind;

    fn provider(api_key: Option<&str>, api_key_env: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            id: "test".into(),
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://example.invalid/v1".into(),
            api_key: api_key.map(String::from),
            api_key_env: api_key_env.map(String::from),
            default_model: None,
            max_tokens: 4096,
        }
    }

    #[test]
    fn plaintext_key_takes_precedence() {
        let cfg = provider(Some("sk-plain"), Some("CQ_TEST_UNSET_VAR_1"));
        assert_eq!(resolve_api_key(&cfg).unwrap(), "sk-plain");
    }

    #[test]
    fn env_var_is_consulted() {
        std::env::set_var("CQ_TEST_KEY_VAR_2", "sk-from-env");
        let cfg = provider(None, Some("CQ_TEST_KEY_VAR_2"));
        assert_eq!(resolve_api_key(&cfg).unwrap(), "sk-from-env");
        std::env::remove_var("CQ_TEST_KEY_VAR_2");
    }

    #[test]
    fn missing_key_is_an_auth_error() {
        let cfg = provider(None, Some("CQ_TEST_NONEXISTENT_VAR_3"));
        let err = resolve_api_key(&cfg).unwrap_err();
        assert!(err.to_string().contains("CQ_TEST_NONEXISTENT_VAR_3"));
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"rate limited"}}"#),
            "rate limited"
        );
        assert_eq!(extract_error_message("plain text body"), "plain text body");
        assert_eq!(extract_error_message(r#"{"unrelated":1}"#), r#"{"unrelated":1}"#);
    }

    #[test]
    fn secrets_are_masked() {
        let msg = "auth failed for key sk-abc123def456ghi789jkl";
        let masked = mask_secrets(msg);
        assert!(!masked.contains("sk-abc123def456ghi789jkl"));
        assert!(masked.contains("..."));
    }
}
