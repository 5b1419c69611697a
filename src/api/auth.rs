//! Signup and signin endpoints
//!
//! The magic-link surface: submitting signup requests, redeeming
//! invitation and signin links, and signing out. Redeem failures are a
//! uniform 404 regardless of why the token did not match.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::AppState;
use crate::auth::{clear_session_cookie, session_cookie};
use crate::error::AppError;

/// Create auth router
///
/// Routes:
/// - POST /sign/up
/// - GET  /sign/up/:token
/// - POST /api/signin
/// - GET  /sign/in/:token
/// - POST /sign/out
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/sign/up", post(sign_up_submit))
        .route("/sign/up/:token", get(sign_up_complete))
        .route("/api/signin", post(signin_request))
        .route("/sign/in/:token", get(signin_complete))
        .route("/sign/out", post(sign_out))
}

/// Signup request body
#[derive(Debug, Deserialize)]
struct SignupBody {
    username: String,
    email: String,
    intro: Option<String>,
}

/// POST /sign/up
///
/// Accepts a signup application; it waits for admin approval.
async fn sign_up_submit(
    State(state): State<AppState>,
    Json(body): Json<SignupBody>,
) -> Result<Response, AppError> {
    let request = state
        .signup
        .submit(&body.username, &body.email, body.intro)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "ok": true, "request_id": request.id })),
    )
        .into_response())
}

/// GET /sign/up/:token
///
/// Redeems an invitation link: activates the account, starts a session
/// and redirects home.
async fn sign_up_complete(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let Some(account) = state.signup.complete(&state.federation, &token).await? else {
        return Err(AppError::NotFound);
    };

    let jar = jar.add(session_cookie(&state, &account)?);
    Ok((jar, Redirect::to("/")).into_response())
}

/// Signin request body
#[derive(Debug, Deserialize)]
struct SigninBody {
    email: String,
}

/// POST /api/signin
///
/// Requests a signin link. Always answers 204, whether or not the email
/// belongs to an account.
async fn signin_request(
    State(state): State<AppState>,
    Json(body): Json<SigninBody>,
) -> StatusCode {
    match state.signup.request_signin(&body.email).await {
        Ok(Some((account, token))) => {
            // Stands in for the mail delivery collaborator; the link is
            // the token's one outbound message
            tracing::info!(
                username = %account.username,
                "Signin link: {}/sign/in/{}",
                state.federation.origin(),
                token
            );
        }
        Ok(None) => {}
        Err(error) => {
            tracing::error!(error = %error, "Failed to process signin request");
        }
    }

    StatusCode::NO_CONTENT
}

/// GET /sign/in/:token
///
/// Redeems a signin link, starts a session and redirects home.
async fn signin_complete(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let Some(account) = state.signup.signin(&token).await? else {
        return Err(AppError::NotFound);
    };

    tracing::info!(username = %account.username, "Signin completed");

    let jar = jar.add(session_cookie(&state, &account)?);
    Ok((jar, Redirect::to("/")).into_response())
}

/// POST /sign/out
async fn sign_out(jar: CookieJar) -> Response {
    let jar = jar.remove(clear_session_cookie());
    (jar, Redirect::to("/")).into_response()
}
