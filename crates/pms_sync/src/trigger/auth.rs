//! Bearer authorization for the trigger endpoint.
//!
//! A bearer value is accepted, in order, as the scheduler's shared secret, as
//! the manual console sentinel, or as an operator session token. With no
//! shared secret configured the gate is open. Bearer values are compared by
//! SHA-256 digest in constant time; the gate never holds the plain secret.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::entity::operator::{Column, Entity as Operator};
use crate::sync::TriggerSource;

use super::error::{Result, TriggerError};

/// Bearer value the operator console sends for a manual run.
pub const DEFAULT_MANUAL_SENTINEL: &str = "manual-console";

/// Lowercase hex SHA-256 of a session token, as stored in `operators`.
pub fn token_digest(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .fold(String::with_capacity(64), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}

fn sha256(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Digest equality that does not stop at the first differing byte.
fn digest_matches(candidate: &str, expected: &[u8; 32]) -> bool {
    sha256(candidate)
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// Resolves a session token to an operator's email.
#[async_trait]
pub trait OperatorDirectory: Send + Sync {
    async fn resolve(&self, token: &str) -> std::result::Result<Option<String>, DbErr>;
}

/// [`OperatorDirectory`] over the `operators` table.
#[derive(Clone)]
pub struct DbOperatorDirectory {
    db: Arc<DatabaseConnection>,
}

impl DbOperatorDirectory {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OperatorDirectory for DbOperatorDirectory {
    async fn resolve(&self, token: &str) -> std::result::Result<Option<String>, DbErr> {
        let operator = Operator::find()
            .filter(Column::TokenSha256.eq(token_digest(token)))
            .filter(Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await?;
        Ok(operator.map(|o| o.email))
    }
}

/// Decides who, if anyone, is asking for a run.
#[derive(Clone)]
pub struct AuthGate {
    secret_sha256: Option<[u8; 32]>,
    sentinel_sha256: [u8; 32],
    manual_sentinel: String,
    operators: Option<Arc<dyn OperatorDirectory>>,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("secret", &self.secret_sha256.map(|_| "<redacted>"))
            .field("manual_sentinel", &self.manual_sentinel)
            .field("operators", &self.operators.is_some())
            .finish()
    }
}

impl AuthGate {
    /// A blank secret counts as none.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret_sha256: secret
                .filter(|s| !s.trim().is_empty())
                .map(|s| sha256(&s)),
            sentinel_sha256: sha256(DEFAULT_MANUAL_SENTINEL),
            manual_sentinel: DEFAULT_MANUAL_SENTINEL.to_string(),
            operators: None,
        }
    }

    pub fn with_manual_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.manual_sentinel = sentinel.into();
        self.sentinel_sha256 = sha256(&self.manual_sentinel);
        self
    }

    pub fn with_operators(mut self, directory: Arc<dyn OperatorDirectory>) -> Self {
        self.operators = Some(directory);
        self
    }

    pub fn is_open(&self) -> bool {
        self.secret_sha256.is_none()
    }

    /// Authorize a request from its raw `Authorization` header value.
    ///
    /// # Errors
    /// [`TriggerError::Unauthorized`] when nothing matches, or
    /// [`TriggerError::Directory`] when the operator lookup fails.
    pub async fn authorize(&self, authorization: Option<&str>) -> Result<TriggerSource> {
        let Some(secret) = &self.secret_sha256 else {
            return Ok(TriggerSource::Open);
        };

        let bearer = authorization
            .and_then(bearer_value)
            .ok_or(TriggerError::Unauthorized)?;

        if digest_matches(bearer, secret) {
            return Ok(TriggerSource::Scheduler);
        }
        if digest_matches(bearer, &self.sentinel_sha256) {
            return Ok(TriggerSource::ManualConsole);
        }
        if let Some(directory) = &self.operators
            && let Some(email) = directory.resolve(bearer).await?
        {
            debug!(operator = %email, "operator token accepted");
            return Ok(TriggerSource::Operator { email });
        }

        Err(TriggerError::Unauthorized)
    }
}

fn bearer_value(header: &str) -> Option<&str> {
    let (scheme, value) = header.trim().split_once(' ')?;
    let value = value.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{ActiveModelTrait, Set};
    use uuid::Uuid;

    use crate::db::connect_and_migrate;
    use crate::entity::operator;

    struct FixedDirectory;

    #[async_trait]
    impl OperatorDirectory for FixedDirectory {
        async fn resolve(&self, token: &str) -> std::result::Result<Option<String>, DbErr> {
            Ok((token == "session-123").then(|| "vet@clinic.test".to_string()))
        }
    }

    struct BrokenDirectory;

    #[async_trait]
    impl OperatorDirectory for BrokenDirectory {
        async fn resolve(&self, _token: &str) -> std::result::Result<Option<String>, DbErr> {
            Err(DbErr::Custom("connection lost".to_string()))
        }
    }

    fn gate() -> AuthGate {
        AuthGate::new(Some("s3cret".to_string())).with_operators(Arc::new(FixedDirectory))
    }

    #[tokio::test]
    async fn resolves_each_kind_of_caller() {
        let gate = gate();
        assert_eq!(
            gate.authorize(Some("Bearer s3cret")).await.unwrap(),
            TriggerSource::Scheduler
        );
        assert_eq!(
            gate.authorize(Some("Bearer manual-console")).await.unwrap(),
            TriggerSource::ManualConsole
        );
        assert_eq!(
            gate.authorize(Some("bearer session-123")).await.unwrap(),
            TriggerSource::Operator {
                email: "vet@clinic.test".to_string()
            }
        );
    }

    #[tokio::test]
    async fn rejects_missing_malformed_and_unknown_credentials() {
        let gate = gate();
        for header in [None, Some(""), Some("s3cret"), Some("Basic s3cret"), Some("Bearer "), Some("Bearer nope")] {
            let err = gate.authorize(header).await.expect_err("rejected");
            assert!(matches!(err, TriggerError::Unauthorized), "{header:?}");
        }
    }

    #[tokio::test]
    async fn no_secret_means_open() {
        let gate = AuthGate::new(None);
        assert!(gate.is_open());
        assert_eq!(gate.authorize(None).await.unwrap(), TriggerSource::Open);

        assert!(AuthGate::new(Some("  ".to_string())).is_open());
    }

    #[tokio::test]
    async fn custom_sentinel_replaces_the_default() {
        let gate = AuthGate::new(Some("s3cret".to_string())).with_manual_sentinel("console-7");
        assert_eq!(
            gate.authorize(Some("Bearer console-7")).await.unwrap(),
            TriggerSource::ManualConsole
        );
        assert!(gate.authorize(Some("Bearer manual-console")).await.is_err());
    }

    #[tokio::test]
    async fn directory_failure_is_not_unauthorized() {
        let gate = AuthGate::new(Some("s3cret".to_string())).with_operators(Arc::new(BrokenDirectory));
        let err = gate.authorize(Some("Bearer other")).await.expect_err("lookup fails");
        assert!(matches!(err, TriggerError::Directory(_)));
        // The secret is checked before the directory is consulted.
        assert!(gate.authorize(Some("Bearer s3cret")).await.is_ok());
    }

    #[tokio::test]
    async fn near_misses_of_the_secret_are_rejected() {
        let gate = AuthGate::new(Some("s3cret".to_string()));
        for bearer in ["s3cre", "s3crett", "S3CRET", "s3cret\0"] {
            let header = format!("Bearer {bearer}");
            assert!(gate.authorize(Some(&header)).await.is_err(), "{bearer:?}");
        }
        assert!(!format!("{gate:?}").contains("s3cret"));
    }

    #[test]
    fn digest_comparison_needs_every_byte() {
        let expected = sha256("s3cret");
        assert!(digest_matches("s3cret", &expected));
        assert!(!digest_matches("s3creu", &expected));
        assert!(!digest_matches("", &expected));
    }

    #[test]
    fn digest_is_lowercase_hex_sha256() {
        assert_eq!(
            token_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn db_directory_matches_active_operators_only() {
        let db = connect_and_migrate("sqlite::memory:").await.unwrap();
        for (email, token, active) in [("a@clinic.test", "tok-a", true), ("b@clinic.test", "tok-b", false)] {
            operator::ActiveModel {
                id: Set(Uuid::new_v4()),
                email: Set(email.to_string()),
                token_sha256: Set(token_digest(token)),
                is_active: Set(active),
                created_at: Set(Utc::now().fixed_offset()),
            }
            .insert(&db)
            .await
            .unwrap();
        }

        let directory = DbOperatorDirectory::new(Arc::new(db));
        assert_eq!(
            directory.resolve("tok-a").await.unwrap().as_deref(),
            Some("a@clinic.test")
        );
        assert_eq!(directory.resolve("tok-b").await.unwrap(), None);
        assert_eq!(directory.resolve("tok-c").await.unwrap(), None);
    }
}
