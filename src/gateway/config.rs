use std::env;
use std::fmt;
use std::time::Duration;

use super::envelope::ProviderShape;
use super::request::GenerationOptions;
use crate::error::{GatewayError, GatewayResult};

pub const DEFAULT_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/mistralai/Mistral-7B-Instruct-v0.2";
pub const DEFAULT_TOKEN_ENV: &str = "HF_TOKEN";
pub const DEFAULT_USER_AGENT: &str = concat!("audit-copilot/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Where the bearer token comes from. Environment lookups happen per call, so a token
/// exported after start-up is picked up and a missing one fails that call only.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Env(String),
    Static(String),
}

impl Credential {
    pub fn resolve(&self) -> GatewayResult<String> {
        match self {
            Credential::Env(var) => env::var(var)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    GatewayError::Configuration(format!(
                        "missing provider credential: environment variable {var} is not set"
                    ))
                }),
            Credential::Static(token) if token.trim().is_empty() => Err(
                GatewayError::Configuration("provider credential is empty".to_string()),
            ),
            Credential::Static(token) => Ok(token.clone()),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Env(var) => f.debug_tuple("Env").field(var).finish(),
            Credential::Static(_) => f.write_str("Static(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub shape: ProviderShape,
    /// Sent as `model` in chat-shaped bodies; text endpoints encode the model in the URL.
    pub model: Option<String>,
    pub credential: Credential,
    pub options: GenerationOptions,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            shape: ProviderShape::TextCompletion,
            model: None,
            credential: Credential::Env(DEFAULT_TOKEN_ENV.to_string()),
            options: GenerationOptions::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn new(endpoint: impl Into<String>, shape: ProviderShape) -> Self {
        Self {
            endpoint: endpoint.into(),
            shape,
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_token_env(mut self, var: impl Into<String>) -> Self {
        self.credential = Credential::Env(var.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.credential = Credential::Static(token.into());
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Backoff before attempt `attempt + 1`: base, 2×base, 4×base, ...
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let step = 1u32 << attempt.saturating_sub(1).min(16);
        self.retry_base_delay.saturating_mul(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_credential_is_a_configuration_error() {
        let credential = Credential::Env("AUDIT_COPILOT_TEST_TOKEN_NEVER_SET".to_string());
        let err = credential.resolve().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("AUDIT_COPILOT_TEST_TOKEN_NEVER_SET"));
    }

    #[test]
    fn static_credential_resolves_and_is_redacted() {
        let credential = Credential::Static("hf_secret".to_string());
        assert_eq!(credential.resolve().unwrap(), "hf_secret");
        assert!(!format!("{credential:?}").contains("hf_secret"));
        assert!(Credential::Static("  ".into()).resolve().is_err());
    }

    #[test]
    fn retry_delay_doubles() {
        let config = ProviderConfig::default().with_retry_base_delay(Duration::from_millis(100));
        assert_eq!(config.retry_delay(1), Duration::from_millis(100));
        assert_eq!(config.retry_delay(2), Duration::from_millis(200));
        assert_eq!(config.retry_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn attempts_never_drop_below_one() {
        assert_eq!(ProviderConfig::default().with_max_attempts(0).max_attempts, 1);
    }
}
