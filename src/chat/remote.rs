//! Remote chat completions provider (Azure AI Services deployment endpoint)

use super::config::ProviderConfig;
use super::credential::TokenProvider;
use super::error::{truncate_body, ReplyError, ReplyErrorKind};
use super::ResponseProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const NO_RESPONSE_REPLY: &str = "No response available.";
/// How long a failed response's body may take to read for logging
const ERROR_BODY_READ_LIMIT: Duration = Duration::from_secs(2);

/// Chat completions client.
///
/// The `reqwest::Client` is shared across calls; the Authorization header is
/// attached per request and never stored on the client.
pub struct RemoteChatClient {
    client: Client,
    credentials: Arc<dyn TokenProvider>,
    url: String,
    model_name: String,
    max_tokens: u32,
    temperature: f32,
    system_prompt: String,
    timeout: Duration,
}

impl RemoteChatClient {
    /// Returns `None` when the config has no endpoint.
    pub fn new(
        config: &ProviderConfig,
        credentials: Arc<dyn TokenProvider>,
    ) -> Result<Option<Self>, reqwest::Error> {
        let Some(url) = config.completions_url() else {
            return Ok(None);
        };

        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Some(Self {
            client,
            credentials,
            url,
            model_name: config.model_name.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system_prompt: config.system_prompt.clone(),
            timeout: config.request_timeout,
        }))
    }

    fn build_request<'a>(&'a self, user_text: &'a str) -> CompletionRequest<'a> {
        CompletionRequest {
            messages: [
                WireMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                WireMessage {
                    role: "user",
                    content: user_text,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            model: &self.model_name,
        }
    }

    /// One attempt: token, POST, parse. No retries.
    async fn exchange(&self, user_text: &str) -> Result<String, ReplyError> {
        let token = self.credentials.token().await?;
        let request = self.build_request(user_text);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&token.secret)
            .json(&request)
            .send()
            .await
            .map_err(|e| ReplyError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            // Body is only for the log; a broken one must not change the classification
            let body = tokio::time::timeout(ERROR_BODY_READ_LIMIT, response.text())
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default();
            return Err(ReplyError::rejected(format!(
                "HTTP {status}: {}",
                truncate_body(&body)
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReplyError::from_reqwest(&e))?;
        extract_content(&body)
    }

    /// Race the exchange against cancellation and the deadline
    async fn try_reply(
        &self,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ReplyError> {
        tokio::select! {
            () = cancel.cancelled() => {
                Err(ReplyError::canceled("Request canceled before completion"))
            }
            result = tokio::time::timeout(self.timeout, self.exchange(user_text)) => {
                result.unwrap_or_else(|_| {
                    Err(ReplyError::timeout(format!(
                        "No reply within {}s",
                        self.timeout.as_secs_f32()
                    )))
                })
            }
        }
    }
}

#[async_trait]
impl ResponseProvider for RemoteChatClient {
    async fn reply(&self, user_text: &str, cancel: &CancellationToken) -> String {
        if user_text.trim().is_empty() {
            return ReplyErrorKind::BlankInput.apology().to_string();
        }

        tracing::info!(model = %self.model_name, "Sending chat completion request");

        match self.try_reply(user_text, cancel).await {
            Ok(content) => {
                tracing::info!("Received chat completion");
                content
            }
            Err(e) => {
                tracing::error!(
                    kind = ?e.kind,
                    error = %e.message,
                    "Chat completion failed"
                );
                e.apology().to_string()
            }
        }
    }

    fn name(&self) -> &str {
        "remote"
    }
}

/// Pull `choices[0].message.content` out of a success body
fn extract_content(body: &str) -> Result<String, ReplyError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ReplyError::malformed(format!("Failed to parse response: {e}")))?;

    let content = value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .ok_or_else(|| ReplyError::rejected("Response has no choices[0].message.content"))?;

    match content {
        serde_json::Value::String(text) => Ok(text.clone()),
        serde_json::Value::Null => Ok(NO_RESPONSE_REPLY.to_string()),
        other => Err(ReplyError::malformed(format!(
            "Expected string content, got {other}"
        ))),
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    messages: [WireMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}
