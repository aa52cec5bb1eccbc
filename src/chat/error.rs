//! Reply error types and the user-facing apologies they map to

use thiserror::Error;

pub const BLANK_INPUT_REPLY: &str = "Please enter a message.";
pub const NETWORK_APOLOGY: &str = "I'm sorry, I encountered a network error while processing your request. Please try again later.";
pub const TIMEOUT_APOLOGY: &str =
    "I'm sorry, your request took too long to process. Please try again.";
pub const CANCELED_APOLOGY: &str =
    "I'm sorry, your request was canceled before it could be completed. Please try again.";
pub const PARSE_APOLOGY: &str = "I'm sorry, I encountered an error processing the service response. Please try again later.";
pub const GENERIC_APOLOGY: &str =
    "I'm sorry, I couldn't process your request at this time. Please try again.";

/// Upstream bodies quoted in errors are cut to this many characters
const MAX_BODY_CHARS: usize = 512;

/// Provider failure with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ReplyError {
    pub kind: ReplyErrorKind,
    pub message: String,
}

impl ReplyError {
    pub fn new(kind: ReplyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ReplyErrorKind::Transport, message)
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::new(ReplyErrorKind::Credential, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ReplyErrorKind::Timeout, message)
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(ReplyErrorKind::Canceled, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ReplyErrorKind::MalformedResponse, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ReplyErrorKind::ProviderRejected, message)
    }

    /// Classify a reqwest failure
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            Self::transport(format!("Connection failed: {e}"))
        } else if e.is_decode() {
            Self::malformed(format!("Failed to decode response: {e}"))
        } else {
            Self::transport(format!("Request failed: {e}"))
        }
    }

    pub fn apology(&self) -> &'static str {
        self.kind.apology()
    }
}

/// Upstream response body shortened for error messages and logs
pub fn truncate_body(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(MAX_BODY_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyErrorKind {
    /// Empty or whitespace-only user text
    BlankInput,
    /// Network or connection failure
    Transport,
    /// Bearer token could not be acquired
    Credential,
    /// Deadline exceeded
    Timeout,
    /// Canceled by shutdown or the caller
    Canceled,
    /// Body is not JSON of the expected shape
    MalformedResponse,
    /// Non-success status, or success without the expected fields
    ProviderRejected,
}

impl ReplyErrorKind {
    pub fn apology(self) -> &'static str {
        match self {
            Self::BlankInput => BLANK_INPUT_REPLY,
            Self::Transport | Self::Credential => NETWORK_APOLOGY,
            Self::Timeout => TIMEOUT_APOLOGY,
            Self::Canceled => CANCELED_APOLOGY,
            Self::MalformedResponse => PARSE_APOLOGY,
            Self::ProviderRejected => GENERIC_APOLOGY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_folds_into_network_apology() {
        assert_eq!(ReplyError::credential("no identity").apology(), NETWORK_APOLOGY);
        assert_eq!(ReplyError::transport("refused").apology(), NETWORK_APOLOGY);
    }

    #[test]
    fn test_apologies_are_distinct_per_kind() {
        let kinds = [
            ReplyErrorKind::BlankInput,
            ReplyErrorKind::Transport,
            ReplyErrorKind::Timeout,
            ReplyErrorKind::Canceled,
            ReplyErrorKind::MalformedResponse,
            ReplyErrorKind::ProviderRejected,
        ];
        let mut apologies: Vec<_> = kinds.iter().map(|k| k.apology()).collect();
        apologies.sort_unstable();
        apologies.dedup();
        assert_eq!(apologies.len(), kinds.len());
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");

        let long = "é".repeat(MAX_BODY_CHARS + 10);
        let cut = truncate_body(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), MAX_BODY_CHARS + 3);
    }

    #[test]
    fn test_display_is_message() {
        let err = ReplyError::rejected("HTTP 503");
        assert_eq!(err.to_string(), "HTTP 503");
        assert_eq!(err.kind, ReplyErrorKind::ProviderRejected);
    }
}
