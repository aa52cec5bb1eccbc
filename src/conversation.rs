//! Conversation transcripts
//!
//! A transcript is an ordered, append-only log of chat messages owned by the
//! caller's session. The store only builds and transforms transcript values;
//! persisting them is the session layer's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Greeting every fresh or reset transcript starts with
pub const GREETING: &str =
    "Hello! I'm your AI assistant for Zava Storefront. How can I help you today?";

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::now(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::now(Role::Assistant, content)
    }

    fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered message log for one conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Builds and transforms transcripts.
///
/// Role alternation is not enforced: two user messages in a row are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationStore;

impl ConversationStore {
    /// A transcript holding only the greeting
    pub fn initial() -> Transcript {
        Transcript {
            messages: vec![Message::assistant(GREETING)],
        }
    }

    /// Discard all history. Same as [`ConversationStore::initial`].
    pub fn reset() -> Transcript {
        Self::initial()
    }

    /// Append `message`, keeping timestamps non-decreasing.
    pub fn append(mut transcript: Transcript, mut message: Message) -> Transcript {
        if let Some(last) = transcript.messages.last() {
            if message.timestamp < last.timestamp {
                message.timestamp = last.timestamp;
            }
        }
        transcript.messages.push(message);
        transcript
    }

    /// Serialize to the persisted layout: a JSON array of `{role, content, timestamp}`.
    pub fn encode(transcript: &Transcript) -> String {
        // Vec of plain structs with string/enum/timestamp fields cannot fail to serialize
        serde_json::to_string(transcript).unwrap_or_else(|_| "[]".to_string())
    }

    /// Deserialize a stored transcript.
    ///
    /// Corrupt input yields an empty transcript instead of an error.
    pub fn decode(raw: &str) -> Transcript {
        match serde_json::from_str::<Transcript>(raw) {
            Ok(transcript) => transcript,
            Err(e) => {
                tracing::warn!(
                    event = "transcript_corrupt",
                    error = %e,
                    stored_len = raw.len(),
                    "Discarding unreadable stored transcript"
                );
                Transcript::default()
            }
        }
    }
}
