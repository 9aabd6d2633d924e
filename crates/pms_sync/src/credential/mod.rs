//! OAuth credential lifecycle for the remote platform.
//!
//! [`CredentialManager::get_valid_token`] is the only entry point the sync
//! engine uses. It hands out the stored access token while it is comfortably
//! inside its lifetime and otherwise performs a `refresh_token` grant, persisting
//! the rotated credential before returning it. Failures are logged and reported
//! as `None`; the caller decides what an unauthenticated run means.

mod error;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::http::{HttpRequest, HttpTransport};

pub use error::{CredentialError, Result};
pub use store::CredentialUpdate;

/// Tokens expiring within this many seconds are refreshed early.
pub const DEFAULT_SAFETY_MARGIN_SECS: i64 = 60;

/// Token endpoint settings.
#[derive(Clone)]
pub struct CredentialConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub safety_margin: TimeDelta,
}

impl CredentialConfig {
    pub fn new(token_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: None,
            safety_margin: TimeDelta::seconds(DEFAULT_SAFETY_MARGIN_SECS),
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_safety_margin(mut self, margin: TimeDelta) -> Self {
        self.safety_margin = margin;
        self
    }
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("safety_margin", &self.safety_margin)
            .finish()
    }
}

/// A bearer token valid until `expires_at`.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// The raw token, for the `Authorization` header only.
    pub fn secret(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Successful response from the token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Error body from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Whether a token expiring at `expires_at` must be refreshed at `now`.
///
/// A token is reusable only while `now < expires_at - margin`.
///
/// ```
/// use chrono::{TimeDelta, Utc};
/// use pms_sync::credential::token_is_expired;
///
/// let now = Utc::now();
/// let margin = TimeDelta::seconds(60);
/// assert!(!token_is_expired(now + TimeDelta::minutes(10), margin, now));
/// assert!(token_is_expired(now + TimeDelta::seconds(30), margin, now));
/// ```
pub fn token_is_expired(expires_at: DateTime<Utc>, margin: TimeDelta, now: DateTime<Utc>) -> bool {
    expires_at
        .checked_sub_signed(margin)
        .is_none_or(|refresh_at| now >= refresh_at)
}

/// Absolute expiry for a token issued at `now` lasting `expires_in` seconds.
pub fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>> {
    TimeDelta::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| CredentialError::Parse(format!("expires_in out of range: {expires_in}")))
}

/// Owns the stored credential and refreshes it on demand.
#[derive(Clone)]
pub struct CredentialManager {
    db: Arc<DatabaseConnection>,
    transport: Arc<dyn HttpTransport>,
    config: CredentialConfig,
}

impl CredentialManager {
    pub fn new(
        db: Arc<DatabaseConnection>,
        transport: Arc<dyn HttpTransport>,
        config: CredentialConfig,
    ) -> Self {
        Self {
            db,
            transport,
            config,
        }
    }

    /// A token valid for at least the safety margin, or `None` if none can be had.
    pub async fn get_valid_token(&self) -> Option<AccessToken> {
        match self.try_get_valid_token(Utc::now()).await {
            Ok(token) => Some(token),
            Err(CredentialError::NotSeeded) => {
                warn!("no stored credential; run `pms-sync auth seed` first");
                None
            }
            Err(e) => {
                error!(error = %e, "could not obtain a valid access token");
                None
            }
        }
    }

    /// Same as [`get_valid_token`](Self::get_valid_token), surfacing the failure.
    pub async fn try_get_valid_token(&self, now: DateTime<Utc>) -> Result<AccessToken> {
        let stored = store::load(&self.db)
            .await?
            .ok_or(CredentialError::NotSeeded)?;
        let expires_at = stored.expires_at.with_timezone(&Utc);

        if !token_is_expired(expires_at, self.config.safety_margin, now) {
            debug!(expires_at = %expires_at, "reusing stored access token");
            return Ok(AccessToken::new(stored.access_token, expires_at));
        }

        info!(expires_at = %expires_at, "access token expired or expiring, refreshing");
        let response = self.refresh(&stored.refresh_token).await?;

        let expires_at = expiry_after(now, response.expires_in)?;
        let refresh_token = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .unwrap_or(stored.refresh_token);

        store::save(
            &self.db,
            &CredentialUpdate {
                access_token: &response.access_token,
                refresh_token: &refresh_token,
                expires_at,
                issued_at: now,
            },
        )
        .await?;

        info!(expires_at = %expires_at, "access token refreshed");
        Ok(AccessToken::new(response.access_token, expires_at))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let mut fields = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(secret) = &self.config.client_secret {
            fields.push(("client_secret", secret.as_str()));
        }

        let response = self
            .transport
            .send(HttpRequest::post_form(&self.config.token_url, &fields))
            .await?;

        if !response.is_success() {
            let message = match serde_json::from_slice::<TokenErrorResponse>(&response.body) {
                Ok(err) => err.error_description.unwrap_or(err.error),
                Err(_) => response.body_snippet(),
            };
            return Err(CredentialError::Rejected {
                status: response.status,
                message,
            });
        }

        let parsed: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| CredentialError::Parse(e.to_string()))?;
        if parsed.access_token.is_empty() {
            return Err(CredentialError::Parse("empty access_token".to_string()));
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::db::connect_and_migrate;
    use crate::http::{HttpMethod, MockTransport};

    const TOKEN_URL: &str = "https://pms.test/oauth/access_token";

    async fn setup(expires_in: TimeDelta) -> (CredentialManager, MockTransport, Arc<DatabaseConnection>) {
        let db = Arc::new(connect_and_migrate("sqlite::memory:").await.unwrap());
        let now = Utc::now();
        store::save(
            &db,
            &CredentialUpdate {
                access_token: "stored-access",
                refresh_token: "stored-refresh",
                expires_at: now + expires_in,
                issued_at: now,
            },
        )
        .await
        .unwrap();

        let transport = MockTransport::new();
        let manager = CredentialManager::new(
            Arc::clone(&db),
            Arc::new(transport.clone()),
            CredentialConfig::new(TOKEN_URL, "client-1").with_client_secret("s3cret"),
        );
        (manager, transport, db)
    }

    #[test]
    fn expiry_respects_the_safety_margin() {
        let now = Utc::now();
        let margin = TimeDelta::seconds(60);
        assert!(!token_is_expired(now + TimeDelta::seconds(61), margin, now));
        assert!(token_is_expired(now + TimeDelta::seconds(60), margin, now));
        assert!(token_is_expired(now + TimeDelta::seconds(10), margin, now));
        assert!(token_is_expired(now - TimeDelta::hours(1), margin, now));
    }

    #[tokio::test]
    async fn fresh_token_is_reused_without_network() {
        let (manager, transport, _db) = setup(TimeDelta::hours(1)).await;

        let first = manager.get_valid_token().await.expect("token");
        let second = manager.get_valid_token().await.expect("token");

        assert_eq!(first.secret(), "stored-access");
        assert_eq!(first, second);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn expiring_token_is_refreshed_once_and_persisted() {
        let (manager, transport, db) = setup(TimeDelta::seconds(30)).await;
        transport.push_json(
            HttpMethod::Post,
            TOKEN_URL,
            200,
            &json!({"access_token": "new-access", "refresh_token": "new-refresh", "expires_in": 3600}),
        );

        let first = manager.get_valid_token().await.expect("refreshed token");
        let second = manager.get_valid_token().await.expect("cached token");

        assert_eq!(first.secret(), "new-access");
        assert_eq!(second.secret(), "new-access");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        assert!(body.contains("grant_type=refresh_token"));
        assert!(body.contains("refresh_token=stored-refresh"));
        assert!(body.contains("client_id=client-1"));
        assert!(body.contains("client_secret=s3cret"));

        let stored = store::load(&db).await.unwrap().expect("row");
        assert_eq!(stored.access_token, "new-access");
        assert_eq!(stored.refresh_token, "new-refresh");
    }

    #[tokio::test]
    async fn refresh_without_rotation_keeps_old_refresh_token() {
        let (manager, transport, db) = setup(TimeDelta::seconds(-10)).await;
        transport.push_json(
            HttpMethod::Post,
            TOKEN_URL,
            200,
            &json!({"access_token": "new-access", "expires_in": 1800}),
        );

        let token = manager.get_valid_token().await.expect("token");
        assert_eq!(token.secret(), "new-access");

        let stored = store::load(&db).await.unwrap().expect("row");
        assert_eq!(stored.refresh_token, "stored-refresh");
    }

    #[tokio::test]
    async fn rejected_refresh_is_reported_and_keeps_stored_row() {
        let (manager, transport, db) = setup(TimeDelta::seconds(0)).await;
        transport.push_json(
            HttpMethod::Post,
            TOKEN_URL,
            400,
            &json!({"error": "invalid_grant", "error_description": "refresh token revoked"}),
        );

        let err = manager
            .try_get_valid_token(Utc::now())
            .await
            .expect_err("rejected");
        match err {
            CredentialError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "refresh token revoked");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }

        let stored = store::load(&db).await.unwrap().expect("row");
        assert_eq!(stored.access_token, "stored-access");
    }

    #[tokio::test]
    async fn out_of_range_lifetime_yields_none_and_keeps_stored_row() {
        let (manager, transport, db) = setup(TimeDelta::seconds(0)).await;
        transport.push_json(
            HttpMethod::Post,
            TOKEN_URL,
            200,
            &json!({"access_token": "new-access", "expires_in": i64::MAX}),
        );
        transport.push_json(
            HttpMethod::Post,
            TOKEN_URL,
            200,
            &json!({"access_token": "new-access", "expires_in": i64::MAX}),
        );

        let err = manager
            .try_get_valid_token(Utc::now())
            .await
            .expect_err("lifetime overflows");
        assert!(matches!(err, CredentialError::Parse(_)));
        assert!(manager.get_valid_token().await.is_none());

        let stored = store::load(&db).await.unwrap().expect("row");
        assert_eq!(stored.access_token, "stored-access");
    }

    #[test]
    fn expiry_after_rejects_unrepresentable_lifetimes() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, 3600).unwrap(), now + TimeDelta::hours(1));
        assert!(expiry_after(now, i64::MAX).is_err());
        assert!(expiry_after(now, i64::MIN).is_err());
    }

    #[test]
    fn oversized_margin_counts_as_expired() {
        let now = Utc::now();
        assert!(token_is_expired(now + TimeDelta::hours(1), TimeDelta::MAX, now));
    }

    #[tokio::test]
    async fn transport_failure_and_bad_body_yield_none() {
        let (manager, transport, _db) = setup(TimeDelta::seconds(0)).await;
        transport.push_transport_error(HttpMethod::Post, TOKEN_URL, "connection refused");
        transport.push_json(HttpMethod::Post, TOKEN_URL, 200, &json!({"unexpected": true}));

        assert!(manager.get_valid_token().await.is_none());
        assert!(manager.get_valid_token().await.is_none());
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn missing_credential_yields_none_without_network() {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        let transport = MockTransport::new();
        let manager = CredentialManager::new(
            Arc::new(db),
            Arc::new(transport.clone()),
            CredentialConfig::new(TOKEN_URL, "client-1"),
        );

        let err = manager
            .try_get_valid_token(Utc::now())
            .await
            .expect_err("not seeded");
        assert!(matches!(err, CredentialError::NotSeeded));
        assert!(manager.get_valid_token().await.is_none());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let token = AccessToken::new("very-secret", Utc::now());
        assert!(!format!("{token:?}").contains("very-secret"));

        let config = CredentialConfig::new(TOKEN_URL, "client-1").with_client_secret("hidden");
        assert!(!format!("{config:?}").contains("hidden"));
    }
}
