//! Chat orchestrator: ties the conversation store to the response provider.

use crate::chat::{ReplyErrorKind, ResponseProvider};
use crate::conversation::{ConversationStore, Message, Transcript};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of one user turn
#[derive(Debug, Clone)]
pub struct Exchange {
    pub transcript: Transcript,
    pub reply: String,
}

/// Receives user messages and produces updated transcripts.
///
/// Holds no per-conversation state; transcripts are passed in and returned.
pub struct ChatOrchestrator {
    provider: Arc<dyn ResponseProvider>,
    shutdown: CancellationToken,
}

impl ChatOrchestrator {
    pub fn new(provider: Arc<dyn ResponseProvider>) -> Self {
        Self {
            provider,
            shutdown: CancellationToken::new(),
        }
    }

    /// In-flight provider calls are canceled when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Handle one user message.
    ///
    /// Blank input leaves the transcript untouched. Otherwise the user message
    /// is appended before the provider is called and stays appended whatever
    /// the provider returns.
    pub async fn handle_message(&self, transcript: Transcript, user_text: &str) -> Exchange {
        if user_text.trim().is_empty() {
            tracing::debug!("Ignoring blank chat message");
            return Exchange {
                transcript,
                reply: ReplyErrorKind::BlankInput.apology().to_string(),
            };
        }

        tracing::info!(
            provider = %self.provider.name(),
            history_len = transcript.len(),
            "Sending user message to chat provider"
        );

        let transcript = ConversationStore::append(transcript, Message::user(user_text));
        let reply = self.provider.reply(user_text, &self.shutdown).await;
        let transcript = ConversationStore::append(transcript, Message::assistant(reply.clone()));

        Exchange { transcript, reply }
    }

    pub fn reset_conversation(&self) -> Transcript {
        tracing::info!("Clearing chat history");
        ConversationStore::reset()
    }

    pub fn greeting_transcript(&self) -> Transcript {
        ConversationStore::initial()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{MockResponder, BLANK_INPUT_REPLY, GREETING_REPLY};
    use crate::conversation::Role;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn orchestrator() -> ChatOrchestrator {
        ChatOrchestrator::new(Arc::new(MockResponder::new(Duration::ZERO)))
    }

    /// Provider that counts calls and always apologizes
    struct FailingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ResponseProvider for FailingProvider {
        async fn reply(&self, _user_text: &str, _cancel: &CancellationToken) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            "sorry".to_string()
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_blank_message_is_noop() {
        let chat = orchestrator();
        let start = chat.greeting_transcript();

        let exchange = chat.handle_message(start, "").await;
        assert_eq!(exchange.transcript.len(), 1);
        assert_eq!(exchange.reply, BLANK_INPUT_REPLY);

        let exchange = chat.handle_message(exchange.transcript, "   \n").await;
        assert_eq!(exchange.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_message_skips_provider() {
        let provider = Arc::new(FailingProvider {
            calls: AtomicUsize::new(0),
        });
        let chat = ChatOrchestrator::new(provider.clone());
        chat.handle_message(chat.greeting_transcript(), "\t").await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hi_appends_user_then_assistant() {
        let chat = orchestrator();
        let exchange = chat.handle_message(chat.greeting_transcript(), "hi").await;

        let messages = exchange.transcript.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "hi");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].content, GREETING_REPLY);
        assert_eq!(exchange.reply, GREETING_REPLY);
        assert!(messages[1].timestamp <= messages[2].timestamp);
    }

    #[tokio::test]
    async fn test_failed_reply_keeps_user_message() {
        let chat = ChatOrchestrator::new(Arc::new(FailingProvider {
            calls: AtomicUsize::new(0),
        }));
        let exchange = chat.handle_message(chat.greeting_transcript(), "where is my order").await;

        let messages = exchange.transcript.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "where is my order");
        assert_eq!(messages[2].content, "sorry");
    }

    #[tokio::test]
    async fn test_reset_returns_greeting() {
        let chat = orchestrator();
        let exchange = chat.handle_message(chat.greeting_transcript(), "price?").await;
        assert_eq!(exchange.transcript.len(), 3);

        let reset = chat.reset_conversation();
        assert_eq!(reset.len(), 1);
        assert_eq!(reset.messages()[0].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_concurrent_transcripts_are_isolated() {
        let chat = Arc::new(ChatOrchestrator::new(Arc::new(MockResponder::new(
            Duration::from_millis(20),
        ))));

        let a = {
            let chat = chat.clone();
            tokio::spawn(async move {
                let t = chat.greeting_transcript();
                let t = chat.handle_message(t, "alpha one").await.transcript;
                chat.handle_message(t, "alpha two").await.transcript
            })
        };
        let b = {
            let chat = chat.clone();
            tokio::spawn(async move {
                let t = chat.greeting_transcript();
                chat.handle_message(t, "beta one").await.transcript
            })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a.len(), 5);
        assert_eq!(b.len(), 3);
        assert!(a.messages().iter().all(|m| !m.content.starts_with("beta")));
        assert!(b
            .messages()
            .iter()
            .filter(|m| m.role == Role::User)
            .all(|m| m.content.starts_with("beta")));
    }
}
