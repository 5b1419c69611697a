//! Posts endpoints
//!
//! Publishing posts and reading the public timeline.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::AppState;
use crate::auth::current_account;
use crate::error::AppError;

/// Create posts router
///
/// Routes:
/// - POST /api/posts
/// - GET  /api/timeline
pub fn posts_router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", post(publish_post))
        .route("/api/timeline", get(public_timeline))
}

/// Post creation body
#[derive(Debug, Deserialize)]
struct PostBody {
    content: String,
}

/// POST /api/posts
///
/// Publishes a post for the signed-in account.
async fn publish_post(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<PostBody>,
) -> Result<Response, AppError> {
    let account = current_account(&state, &jar).await?;

    let post = state
        .timeline
        .publish(&state.federation, &account, &body.content)
        .await?;

    Ok((StatusCode::CREATED, Json(post)).into_response())
}

/// Timeline query parameters
#[derive(Debug, Deserialize)]
struct TimelineQuery {
    limit: Option<i64>,
}

/// GET /api/timeline
async fn public_timeline(
    State(state): State<AppState>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let entries = state.timeline.timeline(query.limit).await?;
    Ok(Json(serde_json::json!({ "posts": entries })))
}
