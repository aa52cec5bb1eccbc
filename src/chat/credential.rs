//! Bearer token sources for the remote provider

use super::error::{truncate_body, ReplyError};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
/// Tokens this close to expiry are refreshed
const REFRESH_MARGIN_SECS: i64 = 300;

/// Access token with its expiry
#[derive(Clone)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| at - ChronoDuration::seconds(REFRESH_MARGIN_SECS) > now)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of bearer tokens for a fixed audience
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<AccessToken, ReplyError>;
}

/// A token handed in from configuration
pub struct StaticToken {
    secret: String,
}

impl StaticToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<AccessToken, ReplyError> {
        Ok(AccessToken {
            secret: self.secret.clone(),
            expires_at: None,
        })
    }
}

/// Where the managed identity token comes from
#[derive(Debug, Clone)]
pub enum IdentityEndpoint {
    /// Azure instance metadata service
    Imds { url: String },
    /// App Service / Functions identity endpoint
    AppService { url: String, header: String },
}

impl IdentityEndpoint {
    /// App Service when `IDENTITY_ENDPOINT` and `IDENTITY_HEADER` are set, IMDS otherwise
    pub fn from_env() -> Self {
        match (
            std::env::var("IDENTITY_ENDPOINT").ok(),
            std::env::var("IDENTITY_HEADER").ok(),
        ) {
            (Some(url), Some(header)) => Self::AppService { url, header },
            _ => Self::Imds {
                url: IMDS_ENDPOINT.to_string(),
            },
        }
    }
}

/// Managed identity credential with an in-process token cache
pub struct ManagedIdentityCredential {
    client: Client,
    endpoint: IdentityEndpoint,
    resource: String,
    cached: Mutex<Option<AccessToken>>,
}

impl ManagedIdentityCredential {
    pub fn new(
        endpoint: IdentityEndpoint,
        resource: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            endpoint,
            resource: resource.into(),
            cached: Mutex::new(None),
        })
    }

    async fn fetch(&self) -> Result<AccessToken, ReplyError> {
        let request = match &self.endpoint {
            IdentityEndpoint::Imds { url } => self
                .client
                .get(url)
                .header("Metadata", "true")
                .query(&[
                    ("api-version", IMDS_API_VERSION),
                    ("resource", self.resource.as_str()),
                ]),
            IdentityEndpoint::AppService { url, header } => self
                .client
                .get(url)
                .header("X-IDENTITY-HEADER", header)
                .query(&[
                    ("api-version", APP_SERVICE_API_VERSION),
                    ("resource", self.resource.as_str()),
                ]),
        };

        let response = request
            .send()
            .await
            .map_err(|e| ReplyError::credential(format!("Token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ReplyError::credential(format!("Failed to read token response: {e}")))?;

        if !status.is_success() {
            return Err(ReplyError::credential(format!(
                "Token endpoint returned HTTP {status}: {}",
                truncate_body(&body)
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ReplyError::credential(format!("Unreadable token response: {e}")))?;

        let expires_at = parsed.expires_at();
        Ok(AccessToken {
            secret: parsed.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl TokenProvider for ManagedIdentityCredential {
    async fn token(&self) -> Result<AccessToken, ReplyError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.clone());
        }

        let token = self.fetch().await?;
        tracing::debug!(expires_at = ?token.expires_at, "Acquired managed identity token");
        *cached = Some(token.clone());
        Ok(token)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Epoch seconds; a string in both endpoint flavors
    #[serde(default)]
    expires_on: Option<serde_json::Value>,
}

impl TokenResponse {
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs = match self.expires_on.as_ref()? {
            serde_json::Value::String(s) => s.parse::<i64>().ok()?,
            serde_json::Value::Number(n) => n.as_i64()?,
            _ => return None,
        };
        DateTime::from_timestamp(secs, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::HeaderMap, routing::get, Json, Router};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/token")
    }

    #[test]
    fn test_expires_on_formats() {
        let as_string = TokenResponse {
            access_token: "t".into(),
            expires_on: Some(serde_json::json!("1700000000")),
        };
        let as_number = TokenResponse {
            access_token: "t".into(),
            expires_on: Some(serde_json::json!(1_700_000_000)),
        };
        let expected = DateTime::from_timestamp(1_700_000_000, 0);
        assert_eq!(as_string.expires_at(), expected);
        assert_eq!(as_number.expires_at(), expected);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let token = AccessToken {
            secret: "super-secret".into(),
            expires_at: None,
        };
        assert!(!format!("{token:?}").contains("super-secret"));
    }

    #[tokio::test]
    async fn test_imds_request_and_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            "/token",
            get(
                move |headers: HeaderMap, Query(q): Query<HashMap<String, String>>| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(headers.get("Metadata").unwrap(), "true");
                        assert_eq!(
                            q.get("resource").unwrap(),
                            "https://cognitiveservices.azure.com"
                        );
                        let expires = (Utc::now().timestamp() + 3600).to_string();
                        Json(serde_json::json!({
                            "access_token": "imds-token",
                            "expires_on": expires
                        }))
                    }
                },
            ),
        );
        let url = serve(router).await;

        let credential = ManagedIdentityCredential::new(
            IdentityEndpoint::Imds { url },
            "https://cognitiveservices.azure.com",
        )
        .unwrap();

        assert_eq!(credential.token().await.unwrap().secret, "imds-token");
        assert_eq!(credential.token().await.unwrap().secret, "imds-token");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_app_service_header() {
        let router = Router::new().route(
            "/token",
            get(|headers: HeaderMap| async move {
                let header = headers
                    .get("X-IDENTITY-HEADER")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(serde_json::json!({"access_token": header}))
            }),
        );
        let url = serve(router).await;

        let credential = ManagedIdentityCredential::new(
            IdentityEndpoint::AppService {
                url,
                header: "shh".into(),
            },
            "https://cognitiveservices.azure.com",
        )
        .unwrap();

        let token = credential.token().await.unwrap();
        assert_eq!(token.secret, "shh");
        assert!(token.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_endpoint_failure_is_credential_error() {
        let router = Router::new().route(
            "/token",
            get(|| async { (axum::http::StatusCode::BAD_REQUEST, "no identity") }),
        );
        let url = serve(router).await;

        let credential =
            ManagedIdentityCredential::new(IdentityEndpoint::Imds { url }, "aud").unwrap();
        let err = credential.token().await.unwrap_err();
        assert_eq!(err.kind, super::super::error::ReplyErrorKind::Credential);
    }

    #[tokio::test]
    async fn test_long_error_body_is_truncated() {
        let router = Router::new().route(
            "/token",
            get(|| async { (axum::http::StatusCode::BAD_REQUEST, "x".repeat(10_000)) }),
        );
        let url = serve(router).await;

        let credential =
            ManagedIdentityCredential::new(IdentityEndpoint::Imds { url }, "aud").unwrap();
        let err = credential.token().await.unwrap_err();
        assert!(err.message.starts_with("Token endpoint returned HTTP 400"));
        assert!(err.message.len() < 600);
    }
}
