//! Keyword-driven local responder used when no endpoint is configured

use super::error::ReplyErrorKind;
use super::ResponseProvider;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const GREETING_REPLY: &str = "Hello! Welcome to Zava Storefront. How can I assist you today?";
pub const CATALOG_REPLY: &str = "We have a wide range of products including headphones, smartwatches, speakers, and more. You can browse our catalog on the home page!";
pub const HELP_REPLY: &str = "I'm here to help! You can ask me about our products, how to place an order, or any other questions about Zava Storefront.";
pub const PRICING_REPLY: &str = "Our products range from $29.99 to $199.99. Check out our home page to see the full catalog with prices!";

/// Keyword rules, first match wins
const RULES: &[(&[&str], &str)] = &[
    (&["hello", "hi"], GREETING_REPLY),
    (&["product", "shop"], CATALOG_REPLY),
    (&["help"], HELP_REPLY),
    (&["price", "cost"], PRICING_REPLY),
];

/// Canned reply for `user_text`
pub fn canned_reply(user_text: &str) -> String {
    let lower = user_text.to_lowercase();
    RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map_or_else(
            || {
                format!(
                    "Thank you for your message: \"{user_text}\". I'm currently in demo mode. When connected to Azure AI Services, I'll be able to provide more detailed and intelligent responses!"
                )
            },
            |(_, reply)| (*reply).to_string(),
        )
}

/// Local responder with a fixed simulated latency
pub struct MockResponder {
    delay: Duration,
}

impl MockResponder {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for MockResponder {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

#[async_trait]
impl ResponseProvider for MockResponder {
    async fn reply(&self, user_text: &str, _cancel: &CancellationToken) -> String {
        if user_text.trim().is_empty() {
            return ReplyErrorKind::BlankInput.apology().to_string();
        }

        tracing::info!("Operating in mock mode - returning simulated response");
        // Not cancelable
        tokio::time::sleep(self.delay).await;
        canned_reply(user_text)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
