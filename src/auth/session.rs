//! Session management
//!
//! Uses HMAC-signed tokens stored in cookies.
//! No server-side session storage needed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Session cookie name
pub const SESSION_COOKIE: &str = "session";

/// User session data
///
/// Stored in a signed cookie. Carries just enough to identify the
/// signed-in account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Account ID
    pub account_id: String,
    /// Account username
    pub username: String,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a session for an account, valid for `max_age_seconds`.
    pub fn for_account(account: &crate::data::Account, max_age_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            account_id: account.id.clone(),
            username: account.username.clone(),
            created_at: now,
            expires_at: now + Duration::seconds(max_age_seconds),
        }
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Create a signed session token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
///
/// # Arguments
/// * `session` - Session data to encode
/// * `secret` - HMAC secret key
///
/// # Returns
/// Signed token string
pub fn create_session_token(
    session: &Session,
    secret: &str,
) -> Result<String, crate::error::AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // 1. Serialize session to JSON
    let payload =
        serde_json::to_string(session).map_err(|e| crate::error::AppError::Internal(e.into()))?;

    // 2. Base64 encode the payload
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    // 3. Create HMAC-SHA256 signature
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| crate::error::AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    // 4. Return "{payload}.{signature}"
    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify and decode a session token
///
/// # Arguments
/// * `token` - Token string to verify
/// * `secret` - HMAC secret key
///
/// # Returns
/// Decoded session if valid
///
/// # Errors
/// Returns error if signature is invalid, token is malformed or the
/// session has expired
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, crate::error::AppError> {
    use base64::{Engine as _, engine::general_purpose};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    // 1. Split token into payload and signature
    let Some((payload_b64, signature_b64)) = token.split_once('.') else {
        return Err(crate::error::AppError::Unauthorized);
    };

    // 2. Verify HMAC signature
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| crate::error::AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());

    let expected_signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| crate::error::AppError::Unauthorized)?;

    mac.verify_slice(&expected_signature)
        .map_err(|_| crate::error::AppError::Unauthorized)?;

    // 3. Decode and deserialize payload
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| crate::error::AppError::Unauthorized)?;

    let payload_str =
        String::from_utf8(payload_bytes).map_err(|_| crate::error::AppError::Unauthorized)?;

    let session: Session =
        serde_json::from_str(&payload_str).map_err(|_| crate::error::AppError::Unauthorized)?;

    // 4. Check if session is expired
    if session.is_expired() {
        return Err(crate::error::AppError::Unauthorized);
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Account, AccountStatus, EntityId};

    fn test_account() -> Account {
        let now = Utc::now();
        Account {
            id: EntityId::new().0,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            intro: None,
            status: AccountStatus::Active.as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn session_token_round_trips() {
        let account = test_account();
        let session = Session::for_account(&account, 3600);
        let secret = "a-secret-that-is-at-least-32-bytes!!";

        let token = create_session_token(&session, secret).unwrap();
        let decoded = verify_session_token(&token, secret).unwrap();
        assert_eq!(decoded.account_id, account.id);
        assert_eq!(decoded.username, "alice");
    }

    #[test]
    fn tampered_or_foreign_tokens_are_rejected() {
        let account = test_account();
        let session = Session::for_account(&account, 3600);
        let secret = "a-secret-that-is-at-least-32-bytes!!";

        let token = create_session_token(&session, secret).unwrap();

        assert!(verify_session_token(&token, "another-secret-of-32-bytes-or-more!!").is_err());
        assert!(verify_session_token("garbage", secret).is_err());

        let mut tampered = token.clone();
        tampered.insert(1, 'x');
        assert!(verify_session_token(&tampered, secret).is_err());
    }

    #[test]
    fn expired_sessions_are_rejected() {
        let account = test_account();
        let session = Session::for_account(&account, -60);
        let secret = "a-secret-that-is-at-least-32-bytes!!";

        let token = create_session_token(&session, secret).unwrap();
        assert!(verify_session_token(&token, secret).is_err());
    }
}
