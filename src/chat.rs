//! Response provider abstraction
//!
//! A provider turns user text into assistant text. Two implementations exist:
//! a remote chat completions client and a local keyword responder used when
//! no endpoint is configured. Which one is used is decided once, at startup.

mod config;
mod credential;
mod error;
mod mock;
mod remote;

pub use config::ProviderConfig;
pub use credential::{IdentityEndpoint, ManagedIdentityCredential, StaticToken, TokenProvider};
#[allow(unused_imports)] // Public API re-exports
pub use error::{ReplyError, ReplyErrorKind, BLANK_INPUT_REPLY};
#[allow(unused_imports)]
pub use mock::{canned_reply, MockResponder, GREETING_REPLY};
pub use remote::RemoteChatClient;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Common interface for reply providers.
///
/// `reply` never fails: every failure is turned into a user-facing apology.
#[async_trait]
pub trait ResponseProvider: Send + Sync {
    async fn reply(&self, user_text: &str, cancel: &CancellationToken) -> String;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

/// Logging wrapper for response providers
pub struct LoggingProvider {
    inner: Arc<dyn ResponseProvider>,
    name: String,
}

impl LoggingProvider {
    pub fn new(inner: Arc<dyn ResponseProvider>) -> Self {
        let name = inner.name().to_string();
        Self { inner, name }
    }
}

#[async_trait]
impl ResponseProvider for LoggingProvider {
    async fn reply(&self, user_text: &str, cancel: &CancellationToken) -> String {
        let start = std::time::Instant::now();
        let reply = self.inner.reply(user_text, cancel).await;

        tracing::info!(
            provider = %self.name,
            duration_ms = %start.elapsed().as_millis(),
            input_chars = user_text.chars().count(),
            reply_chars = reply.chars().count(),
            "Reply generated"
        );

        reply
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Pick the provider for `config`: remote when an endpoint is set, mock otherwise.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn ResponseProvider>, ReplyError> {
    let provider: Arc<dyn ResponseProvider> = if config.is_mock() {
        tracing::warn!(
            "AZURE_AI_SERVICES_ENDPOINT not configured. Chat will operate in mock mode."
        );
        Arc::new(MockResponder::new(config.mock_delay))
    } else {
        let credentials: Arc<dyn TokenProvider> = match &config.static_token {
            Some(token) => Arc::new(StaticToken::new(token.clone())),
            None => Arc::new(
                ManagedIdentityCredential::new(
                    IdentityEndpoint::from_env(),
                    config.token_resource(),
                )
                .map_err(|e| ReplyError::transport(format!("HTTP client setup failed: {e}")))?,
            ),
        };
        let remote = RemoteChatClient::new(config, credentials)
            .map_err(|e| ReplyError::transport(format!("HTTP client setup failed: {e}")))?
            .ok_or_else(|| ReplyError::transport("Endpoint missing"))?;
        tracing::info!(
            endpoint = config.endpoint_url.as_deref().unwrap_or_default(),
            model = %config.model_name,
            "Chat initialized with Azure AI Services endpoint"
        );
        Arc::new(remote)
    };

    Ok(Arc::new(LoggingProvider::new(provider)))
}
