//! HTTP API for the storefront chat
//!
//! JSON endpoints for loading, extending and clearing a session's transcript.

mod handlers;
mod session;
mod types;

pub use handlers::create_router;
pub use session::{InMemorySessionStore, SessionLocks, SessionStore};
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::orchestrator::ChatOrchestrator;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatOrchestrator>,
    pub sessions: Arc<dyn SessionStore>,
    pub locks: Arc<SessionLocks>,
}

impl AppState {
    pub fn new(chat: Arc<ChatOrchestrator>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            chat,
            sessions,
            locks: Arc::new(SessionLocks::default()),
        }
    }
}
