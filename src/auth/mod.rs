//! Session authentication
//!
//! Handles:
//! - HMAC-signed session cookies
//! - Resolving the signed-in account on requests

pub mod session;

pub use session::{SESSION_COOKIE, Session, create_session_token, verify_session_token};

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::data::Account;
use crate::error::AppError;

/// Resolve the signed-in, active account from the session cookie.
///
/// # Errors
/// Unauthorized when there is no cookie, the token fails verification,
/// or the account is gone or no longer active.
pub async fn current_account(
    state: &crate::AppState,
    jar: &CookieJar,
) -> Result<Account, AppError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Err(AppError::Unauthorized);
    };

    let session = verify_session_token(cookie.value(), &state.config.auth.session_secret)?;

    let account = state
        .db
        .get_account(&session.account_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    if !account.is_active() {
        return Err(AppError::Unauthorized);
    }

    Ok(account)
}

/// Build the session cookie for a freshly signed-in account.
pub fn session_cookie(
    state: &crate::AppState,
    account: &Account,
) -> Result<Cookie<'static>, AppError> {
    let session = Session::for_account(account, state.config.auth.session_max_age);
    let token = create_session_token(&session, &state.config.auth.session_secret)?;

    Ok(Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(state.config.should_use_secure_cookies())
        .same_site(SameSite::Lax)
        .build())
}

/// Build an expired cookie that clears the session.
pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .build()
}
