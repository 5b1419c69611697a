//! Magic link token lifecycle
//!
//! Issues single-use, time-bounded bearer tokens for signup and signin,
//! and consumes them with at-most-once semantics. Only a salted hash of
//! a token is ever stored; the raw value exists once, in the link sent
//! to the user.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::data::{Account, Database, EntityId, MagicLink, SignupRequest, SignupState, TokenType};
use crate::error::AppError;

/// Raw token length in random bytes (hex-encoded to 64 chars)
const TOKEN_BYTES: usize = 32;
/// Per-token salt length in bytes
const SALT_BYTES: usize = 16;

/// Default lifetime when the caller does not pick one
pub const DEFAULT_TTL_MINUTES: i64 = 30;

/// Generate a raw token: 32 random bytes, lowercase hex.
fn generate_token() -> String {
    use rand::RngCore;

    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Hash a raw token for storage.
///
/// Format: `base64(salt).base64(hmac_sha256(key=salt, raw))` with a
/// fresh random salt per token, so equal tokens never share a stored
/// hash and no plaintext-indexable lookup key exists.
fn hash_token(raw: &str) -> Result<String, AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use rand::RngCore;
    use sha2::Sha256;

    let mut salt = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut salt);

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(&salt)
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(raw.as_bytes());
    let digest = mac.finalize().into_bytes();

    Ok(format!(
        "{}.{}",
        general_purpose::URL_SAFE_NO_PAD.encode(salt),
        general_purpose::URL_SAFE_NO_PAD.encode(digest)
    ))
}

/// Check a presented token against a stored hash.
///
/// Recomputes the MAC under the stored salt and compares with the
/// constant-time verifier; malformed hashes simply fail to match.
fn verify_token_hash(raw: &str, stored: &str) -> bool {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let Some((salt_b64, digest_b64)) = stored.split_once('.') else {
        return false;
    };
    let Ok(salt) = general_purpose::URL_SAFE_NO_PAD.decode(salt_b64) else {
        return false;
    };
    let Ok(digest) = general_purpose::URL_SAFE_NO_PAD.decode(digest_b64) else {
        return false;
    };

    type HmacSha256 = Hmac<Sha256>;
    let Ok(mut mac) = HmacSha256::new_from_slice(&salt) else {
        return false;
    };
    mac.update(raw.as_bytes());
    mac.verify_slice(&digest).is_ok()
}

/// Magic link token service
pub struct TokenService {
    db: Arc<Database>,
}

impl TokenService {
    /// Create new token service
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Issue a new token and return the raw value.
    ///
    /// The raw token is returned exactly once and is not recoverable
    /// from storage; a lost token must be reissued.
    pub async fn issue(
        &self,
        token_type: TokenType,
        account_id: Option<&str>,
        request_id: Option<&str>,
        ttl_minutes: Option<i64>,
    ) -> Result<String, AppError> {
        let raw = generate_token();
        let token_hash = hash_token(&raw)?;

        let now = Utc::now();
        let ttl = ttl_minutes.unwrap_or(DEFAULT_TTL_MINUTES);
        let link = MagicLink {
            id: EntityId::new().0,
            account_id: account_id.map(str::to_string),
            request_id: request_id.map(str::to_string),
            token_hash,
            token_type: token_type.as_str().to_string(),
            expires_at: now + Duration::minutes(ttl),
            consumed_at: None,
            created_at: now,
            updated_at: now,
        };

        self.db.insert_magic_link(&link).await?;

        crate::metrics::TOKENS_ISSUED_TOTAL
            .with_label_values(&[token_type.as_str()])
            .inc();
        tracing::info!(
            link_id = %link.id,
            token_type = token_type.as_str(),
            expires_at = %link.expires_at,
            "Magic link issued"
        );

        Ok(raw)
    }

    /// Find the unconsumed link matching a presented token.
    ///
    /// Compares the token against every stored hash of the expected
    /// type; there is no lookup by value. An expired match yields None.
    async fn find_match(
        &self,
        raw: &str,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<Option<MagicLink>, AppError> {
        let candidates = self
            .db
            .list_unconsumed_magic_links(token_type.as_str())
            .await?;

        for link in candidates {
            if !verify_token_hash(raw, &link.token_hash) {
                continue;
            }
            if link.expires_at <= now {
                tracing::debug!(link_id = %link.id, "Magic link matched but is expired");
                return Ok(None);
            }
            return Ok(Some(link));
        }

        Ok(None)
    }

    /// Look up a token without consuming it.
    pub async fn check_validity(
        &self,
        raw: &str,
        token_type: TokenType,
    ) -> Result<Option<MagicLink>, AppError> {
        self.find_match(raw, token_type, Utc::now()).await
    }

    /// Verify a token and consume it exactly once.
    ///
    /// The consumption is a single conditional update; under concurrent
    /// redemption exactly one caller gets the link back and every other
    /// caller sees None.
    pub async fn verify_and_consume(
        &self,
        raw: &str,
        token_type: TokenType,
    ) -> Result<Option<MagicLink>, AppError> {
        let now = Utc::now();
        let Some(link) = self.find_match(raw, token_type, now).await? else {
            return Ok(None);
        };

        if !self.db.consume_magic_link(&link.id, now).await? {
            tracing::debug!(link_id = %link.id, "Magic link lost the consumption race");
            return Ok(None);
        }

        crate::metrics::TOKENS_CONSUMED_TOTAL
            .with_label_values(&[token_type.as_str()])
            .inc();
        tracing::info!(link_id = %link.id, token_type = token_type.as_str(), "Magic link consumed");

        Ok(Some(MagicLink {
            consumed_at: Some(now),
            updated_at: now,
            ..link
        }))
    }

    /// Consume a signup token and return its signup request.
    ///
    /// Returns None unless the linked request exists, is approved and
    /// already has an invited account. All failure modes collapse into
    /// the same outcome so callers cannot distinguish them.
    pub async fn consume_signup_token(
        &self,
        raw: &str,
    ) -> Result<Option<SignupRequest>, AppError> {
        let Some(link) = self.verify_and_consume(raw, TokenType::Signup).await? else {
            return Ok(None);
        };

        let Some(request_id) = link.request_id.as_deref() else {
            tracing::debug!(link_id = %link.id, "Signup link has no request");
            return Ok(None);
        };

        let Some(request) = self.db.get_signup_request(request_id).await? else {
            tracing::debug!(link_id = %link.id, "Signup link points at a missing request");
            return Ok(None);
        };

        if request.state != SignupState::Approved.as_str()
            || request.invitation_account_id.is_none()
        {
            tracing::debug!(
                request_id = %request.id,
                state = %request.state,
                "Signup link request is not redeemable"
            );
            return Ok(None);
        }

        Ok(Some(request))
    }

    /// Consume a signin token and return its account.
    ///
    /// Returns None unless the linked account exists and is active.
    pub async fn consume_signin_token(&self, raw: &str) -> Result<Option<Account>, AppError> {
        let Some(link) = self.verify_and_consume(raw, TokenType::Signin).await? else {
            return Ok(None);
        };

        let Some(account_id) = link.account_id.as_deref() else {
            tracing::debug!(link_id = %link.id, "Signin link has no account");
            return Ok(None);
        };

        let Some(account) = self.db.get_account(account_id).await? else {
            tracing::debug!(link_id = %link.id, "Signin link points at a missing account");
            return Ok(None);
        };

        if !account.is_active() {
            tracing::debug!(
                account_id = %account.id,
                status = %account.status,
                "Signin link account is not active"
            );
            return Ok(None);
        }

        Ok(Some(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AccountStatus, EntityId};
    use tempfile::TempDir;

    async fn create_test_service() -> (TokenService, Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("service-token.db");
        let db = Arc::new(Database::connect(&db_path).await.unwrap());
        (TokenService::new(db.clone()), db, temp_dir)
    }

    async fn insert_account(db: &Database, username: &str, status: AccountStatus) -> String {
        let now = Utc::now();
        let account = Account {
            id: EntityId::new().0,
            username: username.to_string(),
            email: format!("{}@example.com", username),
            intro: None,
            status: status.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        db.insert_account(&account).await.unwrap();
        account.id
    }

    async fn insert_request(db: &Database, username: &str) -> String {
        let now = Utc::now();
        let request = SignupRequest {
            id: EntityId::new().0,
            username: username.to_string(),
            email: format!("{}@example.com", username),
            intro: None,
            state: SignupState::Pending.as_str().to_string(),
            invitation_account_id: None,
            created_at: now,
            updated_at: now,
        };
        db.insert_signup_request(&request).await.unwrap();
        request.id
    }

    #[test]
    fn generated_tokens_are_64_char_lowercase_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn hashes_are_salted_and_verify_round_trips() {
        let raw = generate_token();
        let first = hash_token(&raw).unwrap();
        let second = hash_token(&raw).unwrap();

        // Fresh salt per hash: same token, different stored values
        assert_ne!(first, second);
        assert!(verify_token_hash(&raw, &first));
        assert!(verify_token_hash(&raw, &second));
        assert!(!verify_token_hash("something-else", &first));
        assert!(!verify_token_hash(&raw, "not-a-hash"));
    }

    #[tokio::test]
    async fn token_consumes_exactly_once() {
        let (service, _db, _temp_dir) = create_test_service().await;

        let raw = service
            .issue(TokenType::Signin, None, None, Some(5))
            .await
            .unwrap();

        let first = service
            .verify_and_consume(&raw, TokenType::Signin)
            .await
            .unwrap();
        assert!(first.is_some());
        assert!(first.unwrap().consumed_at.is_some());

        let second = service
            .verify_and_consume(&raw, TokenType::Signin)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn expired_token_never_matches_and_is_not_consumed() {
        let (service, db, _temp_dir) = create_test_service().await;

        // Negative TTL: the link is born expired
        let raw = service
            .issue(TokenType::Signin, None, None, Some(-5))
            .await
            .unwrap();

        assert!(service
            .check_validity(&raw, TokenType::Signin)
            .await
            .unwrap()
            .is_none());
        assert!(service
            .verify_and_consume(&raw, TokenType::Signin)
            .await
            .unwrap()
            .is_none());

        // The row is still unconsumed
        let stored = db
            .list_unconsumed_magic_links(TokenType::Signin.as_str())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].consumed_at.is_none());
    }

    #[tokio::test]
    async fn check_validity_does_not_consume() {
        let (service, _db, _temp_dir) = create_test_service().await;

        let raw = service
            .issue(TokenType::Signin, None, None, None)
            .await
            .unwrap();

        assert!(service
            .check_validity(&raw, TokenType::Signin)
            .await
            .unwrap()
            .is_some());
        // Still redeemable afterwards
        assert!(service
            .verify_and_consume(&raw, TokenType::Signin)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn token_type_scopes_the_lookup() {
        let (service, _db, _temp_dir) = create_test_service().await;

        let raw = service
            .issue(TokenType::Signin, None, None, None)
            .await
            .unwrap();

        assert!(service
            .check_validity(&raw, TokenType::Signup)
            .await
            .unwrap()
            .is_none());
        assert!(service
            .check_validity(&raw, TokenType::Signin)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn concurrent_consumers_produce_exactly_one_winner() {
        let (service, db, _temp_dir) = create_test_service().await;
        let service = Arc::new(service);

        let raw = service
            .issue(TokenType::Signin, None, None, Some(5))
            .await
            .unwrap();

        let a = {
            let service = service.clone();
            let raw = raw.clone();
            tokio::spawn(async move { service.verify_and_consume(&raw, TokenType::Signin).await })
        };
        let b = {
            let service = service.clone();
            let raw = raw.clone();
            tokio::spawn(async move { service.verify_and_consume(&raw, TokenType::Signin).await })
        };

        let first = a.await.unwrap().unwrap();
        let second = b.await.unwrap().unwrap();

        assert_eq!(
            first.is_some() as usize + second.is_some() as usize,
            1,
            "exactly one concurrent redeemer may win"
        );
        assert!(db
            .list_unconsumed_magic_links(TokenType::Signin.as_str())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn signup_token_returns_approved_request_once() {
        let (service, db, _temp_dir) = create_test_service().await;

        let request_id = insert_request(&db, "pat").await;
        let account_id = insert_account(&db, "pat", AccountStatus::Invited).await;
        db.approve_signup_request(&request_id, &account_id, Utc::now())
            .await
            .unwrap();

        let raw = service
            .issue(
                TokenType::Signup,
                Some(&account_id),
                Some(&request_id),
                Some(60),
            )
            .await
            .unwrap();

        let request = service.consume_signup_token(&raw).await.unwrap().unwrap();
        assert_eq!(request.id, request_id);
        assert_eq!(request.invitation_account_id, Some(account_id));

        // The token is gone now
        assert!(service.consume_signup_token(&raw).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn signup_token_for_pending_request_is_opaquely_rejected() {
        let (service, db, _temp_dir) = create_test_service().await;

        let request_id = insert_request(&db, "quinn").await;
        let raw = service
            .issue(TokenType::Signup, None, Some(&request_id), Some(60))
            .await
            .unwrap();

        assert!(service.consume_signup_token(&raw).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn signin_token_requires_active_account() {
        let (service, db, _temp_dir) = create_test_service().await;

        let invited = insert_account(&db, "rita", AccountStatus::Invited).await;
        let raw = service
            .issue(TokenType::Signin, Some(&invited), None, None)
            .await
            .unwrap();
        assert!(service.consume_signin_token(&raw).await.unwrap().is_none());

        let active = insert_account(&db, "sven", AccountStatus::Active).await;
        let raw = service
            .issue(TokenType::Signin, Some(&active), None, None)
            .await
            .unwrap();
        let account = service.consume_signin_token(&raw).await.unwrap().unwrap();
        assert_eq!(account.id, active);
    }
}
