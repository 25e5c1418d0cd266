//! Data models and structures
//!
//! Defines the caller-facing request/response contract and the process-wide
//! configuration injected into the relay at startup.

use crate::retry::RetryPolicy;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Validated image-edit request received from a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    pub prompt_text: String,
    pub image: ImageInput,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInput {
    /// Base64-encoded image bytes.
    pub data: String,
    pub mime_type: String,
}

/// Body returned to the caller, exactly once per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundResult {
    Success {
        #[serde(rename = "base64Data")]
        base64_data: String,
    },
    Failure {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },
}

impl OutboundResult {
    pub fn success(base64_data: String) -> Self {
        Self::Success { base64_data }
    }
}

impl From<&Error> for OutboundResult {
    fn from(err: &Error) -> Self {
        Self::Failure {
            error: err.to_string(),
            details: err.details(),
        }
    }
}

// Configuration
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct Config {
    /// Absent keys are reported per request as a server misconfiguration.
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub bind_address: String,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_jitter: Duration,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("gemini_base_url", &self.gemini_base_url)
            .field("bind_address", &self.bind_address)
            .field("max_attempts", &self.max_attempts)
            .field("retry_base_delay", &self.retry_base_delay)
            .field("retry_max_jitter", &self.retry_max_jitter)
            .field("request_timeout", &self.request_timeout)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            max_attempts: 5,
            retry_base_delay: Duration::from_millis(1000),
            retry_max_jitter: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(120),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            gemini_api_key: lookup("GEMINI_API_KEY").filter(|key| !key.trim().is_empty()),
            gemini_base_url: lookup("GEMINI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_base_url),
            bind_address: lookup("RELAY_BIND_ADDRESS").unwrap_or(defaults.bind_address),
            max_attempts: parse_var(&lookup, "RELAY_MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_base_delay: Duration::from_millis(parse_var(
                &lookup,
                "RELAY_RETRY_BASE_DELAY_MS",
                1000,
            )?),
            retry_max_jitter: Duration::from_millis(parse_var(
                &lookup,
                "RELAY_RETRY_MAX_JITTER_MS",
                1000,
            )?),
            request_timeout: Duration::from_secs(parse_var(
                &lookup,
                "RELAY_REQUEST_TIMEOUT_SECS",
                120,
            )?),
            max_body_bytes: parse_var(&lookup, "RELAY_MAX_BODY_BYTES", defaults.max_body_bytes)?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            self.retry_base_delay,
            self.retry_max_jitter,
        )
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> crate::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: '{}' ({})", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_inbound_request_uses_camel_case() {
        let json = serde_json::json!({
            "promptText": "make it blue",
            "image": { "data": "AAAA", "mimeType": "image/png" },
            "model": "gemini-2.5-flash-image"
        });

        let request: InboundRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.prompt_text, "make it blue");
        assert_eq!(request.image.mime_type, "image/png");
    }

    #[test]
    fn test_outbound_success_shape() {
        let body = serde_json::to_value(OutboundResult::success("AAAA".to_string())).unwrap();
        assert_eq!(body, serde_json::json!({ "base64Data": "AAAA" }));
    }

    #[test]
    fn test_outbound_failure_omits_missing_details() {
        let body = serde_json::to_value(OutboundResult::from(&Error::MethodNotAllowed)).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "Method Not Allowed" }));
    }

    #[test]
    fn test_outbound_failure_carries_details() {
        let err = Error::GenerationBlockedOrFailed {
            message: "blocked".to_string(),
            details: serde_json::json!({ "candidates": [] }),
        };

        let body = serde_json::to_value(OutboundResult::from(&err)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "error": "blocked", "details": { "candidates": [] } })
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_vars(lookup_from(&[])).unwrap();

        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.gemini_base_url, DEFAULT_GEMINI_BASE_URL);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_base_delay, Duration::from_millis(1000));
        assert_eq!(config.retry_max_jitter, Duration::from_millis(1000));
        assert_eq!(config.request_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_config_reads_overrides() {
        let config = Config::from_vars(lookup_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_BASE_URL", "http://localhost:9000/"),
            ("RELAY_MAX_ATTEMPTS", "3"),
            ("RELAY_RETRY_BASE_DELAY_MS", "10"),
        ]))
        .unwrap();

        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(config.gemini_base_url, "http://localhost:9000");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_base_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_config_treats_blank_key_as_missing() {
        let config = Config::from_vars(lookup_from(&[("GEMINI_API_KEY", "  ")])).unwrap();
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_config_rejects_unparseable_numbers() {
        let err = Config::from_vars(lookup_from(&[("RELAY_MAX_ATTEMPTS", "lots")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_config_debug_redacts_api_key() {
        let config = Config::from_vars(lookup_from(&[("GEMINI_API_KEY", "super-secret")])).unwrap();
        let rendered = format!("{:?}", config);

        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
