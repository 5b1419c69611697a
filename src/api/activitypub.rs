//! ActivityPub endpoints
//!
//! - Actor documents for local accounts
//! - Personal and shared inboxes
//! - Followers collection (count only; the membership is not exposed)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::AppState;
use crate::error::AppError;

const ACTIVITY_JSON: &str = "application/activity+json";

/// Create ActivityPub router
///
/// Routes:
/// - GET  /ap/actors/:username
/// - GET  /ap/actors/:username/followers
/// - GET  /ap/actors/:username/outbox
/// - POST /ap/actors/:username/inbox
/// - POST /ap/inbox
pub fn activitypub_router() -> Router<AppState> {
    Router::new()
        .route("/ap/actors/:username", get(actor_document))
        .route("/ap/actors/:username/followers", get(followers_collection))
        .route("/ap/actors/:username/outbox", get(outbox_collection))
        .route("/ap/actors/:username/inbox", post(personal_inbox))
        .route("/ap/inbox", post(shared_inbox))
}

/// GET /ap/actors/:username
///
/// The Person document for a local account.
async fn actor_document(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let actor = state
        .db
        .get_local_actor_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;

    let document = serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": actor.actor_type,
        "id": actor.iri,
        "preferredUsername": actor.preferred_username,
        "name": actor.name,
        "inbox": actor.inbox_url,
        "endpoints": { "sharedInbox": actor.shared_inbox_url },
        "followers": actor.followers_url,
        "manuallyApprovesFollowers": !actor.automatically_approves_followers,
        "url": actor.url,
        "published": actor.published_at,
    });

    Ok((
        [(header::CONTENT_TYPE, ACTIVITY_JSON)],
        Json(document),
    )
        .into_response())
}

/// GET /ap/actors/:username/followers
async fn followers_collection(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let actor = state
        .db
        .get_local_actor_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;

    let collection = serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "OrderedCollection",
        "id": actor.followers_url,
        "totalItems": actor.followers_count,
        "orderedItems": [],
    });

    Ok((
        [(header::CONTENT_TYPE, ACTIVITY_JSON)],
        Json(collection),
    )
        .into_response())
}

/// GET /ap/actors/:username/outbox
///
/// Recent posts of a local actor as Note objects.
async fn outbox_collection(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let actor = state
        .db
        .get_local_actor_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;
    let account_id = actor.account_id.as_deref().ok_or(AppError::NotFound)?;

    let posts = state.timeline.posts_for_account(account_id, Some(20)).await?;
    let items: Vec<serde_json::Value> = posts
        .iter()
        .map(|post| {
            serde_json::json!({
                "type": "Note",
                "id": post.iri,
                "attributedTo": actor.iri,
                "content": post.content,
                "published": post.published_at,
            })
        })
        .collect();

    let collection = serde_json::json!({
        "@context": "https://www.w3.org/ns/activitystreams",
        "type": "OrderedCollection",
        "id": format!("{}/outbox", actor.iri),
        "totalItems": actor.posts_count,
        "orderedItems": items,
    });

    Ok((
        [(header::CONTENT_TYPE, ACTIVITY_JSON)],
        Json(collection),
    )
        .into_response())
}

/// POST /ap/actors/:username/inbox
async fn personal_inbox(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(activity): Json<serde_json::Value>,
) -> Result<Response, AppError> {
    // The addressed actor must exist; the activity's object decides the
    // real target
    if state
        .db
        .get_local_actor_by_username(&username)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }

    state.processor.process(&state.federation, activity).await?;

    Ok((StatusCode::ACCEPTED, "Activity accepted").into_response())
}

/// POST /ap/inbox
async fn shared_inbox(
    State(state): State<AppState>,
    Json(activity): Json<serde_json::Value>,
) -> Result<Response, AppError> {
    state.processor.process(&state.federation, activity).await?;

    Ok((StatusCode::ACCEPTED, "Activity accepted").into_response())
}
