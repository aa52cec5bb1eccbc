//! Provider configuration

use std::time::Duration;

pub const DEFAULT_MODEL: &str = "Phi-4";
pub const DEFAULT_API_VERSION: &str = "2024-02-01";
pub const DEFAULT_TOKEN_SCOPE: &str = "https://cognitiveservices.azure.com/.default";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant for the Zava Storefront e-commerce platform. Help customers with their questions about products, orders, and shopping.";

/// Configuration for the response provider.
///
/// `endpoint_url` decides the mode: absent means replies are synthesized locally.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub endpoint_url: Option<String>,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
    pub api_version: String,
    /// Audience the bearer token is requested for
    pub token_scope: String,
    /// Deadline for one remote exchange, credential fetch included
    pub request_timeout: Duration,
    pub mock_delay: Duration,
    /// Pre-issued bearer token; skips managed identity when set
    pub static_token: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            model_name: DEFAULT_MODEL.to_string(),
            max_tokens: 500,
            temperature: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            token_scope: DEFAULT_TOKEN_SCOPE.to_string(),
            request_timeout: Duration::from_secs(100),
            mock_delay: Duration::from_millis(500),
            static_token: None,
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            endpoint_url: non_empty("AZURE_AI_SERVICES_ENDPOINT"),
            model_name: non_empty("AZURE_AI_MODEL").unwrap_or(defaults.model_name),
            max_tokens: non_empty("AZURE_AI_MAX_TOKENS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_tokens),
            temperature: non_empty("AZURE_AI_TEMPERATURE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.temperature),
            system_prompt: non_empty("AZURE_AI_SYSTEM_PROMPT").unwrap_or(defaults.system_prompt),
            api_version: non_empty("AZURE_AI_API_VERSION").unwrap_or(defaults.api_version),
            token_scope: defaults.token_scope,
            request_timeout: non_empty("AZURE_AI_REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map_or(defaults.request_timeout, Duration::from_secs),
            mock_delay: non_empty("CHAT_MOCK_DELAY_MS")
                .and_then(|v| v.parse().ok())
                .map_or(defaults.mock_delay, Duration::from_millis),
            static_token: non_empty("AZURE_AI_BEARER_TOKEN"),
        }
    }

    pub fn is_mock(&self) -> bool {
        self.endpoint_url.is_none()
    }

    /// Full chat completions URL for the configured deployment
    pub fn completions_url(&self) -> Option<String> {
        self.endpoint_url.as_ref().map(|endpoint| {
            format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                self.model_name,
                self.api_version
            )
        })
    }

    /// Resource audience for token endpoints that take `resource` rather than a scope
    pub fn token_resource(&self) -> &str {
        self.token_scope
            .strip_suffix("/.default")
            .unwrap_or(&self.token_scope)
    }
}
