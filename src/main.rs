//! Storefront chat - conversational assistant service
//!
//! Forwards shopper messages to an Azure AI Services chat deployment, or
//! answers locally from canned replies when no endpoint is configured, and
//! keeps a per-session transcript.

mod api;
mod chat;
mod conversation;
mod orchestrator;

use api::{create_router, AppState, InMemorySessionStore};
use chat::{build_provider, ProviderConfig};
use orchestrator::ChatOrchestrator;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let port: u16 = std::env::var("CHAT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let idle_minutes: u64 = std::env::var("CHAT_SESSION_IDLE_MINUTES")
        .ok()
        .and_then(|m| m.parse().ok())
        .unwrap_or(30);

    let provider_config = ProviderConfig::from_env();
    let provider = build_provider(&provider_config)?;

    // Canceled on shutdown so in-flight provider calls end promptly
    let shutdown = CancellationToken::new();
    let chat = Arc::new(ChatOrchestrator::new(provider).with_shutdown(shutdown.clone()));

    let sessions = Arc::new(InMemorySessionStore::new(idle_timeout(idle_minutes)));
    let state = AppState::new(chat, sessions);
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Storefront chat listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

/// Session idle timeout; absurdly large settings saturate instead of overflowing
fn idle_timeout(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_timeout() {
        assert_eq!(idle_timeout(30), Duration::from_secs(1800));
        assert_eq!(idle_timeout(u64::MAX), Duration::from_secs(u64::MAX));
    }
}
