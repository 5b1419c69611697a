//! Admin API endpoints
//!
//! Signup moderation: listing pending applications, approving them
//! (which mints the invitation link) and rejecting them. Guarded by a
//! shared admin secret header.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;

use crate::AppState;
use crate::error::AppError;

/// Header carrying the admin secret
const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Create admin router
///
/// Routes (nested under /admin):
/// - GET  /signups
/// - POST /signups/:id/approve
/// - POST /signups/:id/reject
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/signups", get(list_signups))
        .route("/signups/:id/approve", post(approve_signup))
        .route("/signups/:id/reject", post(reject_signup))
}

/// Check the admin secret header against configuration.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let presented = headers
        .get(ADMIN_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    if presented != state.config.admin.secret {
        return Err(AppError::Forbidden);
    }

    Ok(())
}

/// Signup list filter
#[derive(Debug, Deserialize)]
struct SignupListQuery {
    state: Option<String>,
}

/// GET /admin/signups
async fn list_signups(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SignupListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&state, &headers)?;

    let requests = state.db.list_signup_requests(query.state.as_deref()).await?;

    Ok(Json(serde_json::json!({ "signup_requests": requests })))
}

/// POST /admin/signups/:id/approve
///
/// Approves a pending request and returns the invitation link. The raw
/// token in it is shown here once and cannot be recovered later.
async fn approve_signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;

    let Some(approved) = state.signup.approve(&id).await? else {
        // Unknown id or not pending; either way nothing changed
        return Err(AppError::NotFound);
    };

    let invite_url = format!(
        "{}/sign/up/{}",
        state.federation.origin(),
        approved.token
    );

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "request": approved.request,
            "account_id": approved.account.id,
            "invite_url": invite_url,
        })),
    )
        .into_response())
}

/// POST /admin/signups/:id/reject
async fn reject_signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;

    if !state.signup.reject(&id).await? {
        return Err(AppError::NotFound);
    }

    Ok((StatusCode::OK, Json(serde_json::json!({ "ok": true }))).into_response())
}
