//! Well-known endpoints
//!
//! - /.well-known/webfinger
//! - /.well-known/nodeinfo

use axum::{
    Router,
    extract::{Query, State},
    response::Json,
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::AppError;
use crate::federation::{SOFTWARE_NAME, SOFTWARE_VERSION};

/// Create well-known router
///
/// Routes:
/// - GET /.well-known/webfinger
/// - GET /.well-known/nodeinfo
/// - GET /nodeinfo/2.0
pub fn wellknown_router() -> Router<AppState> {
    Router::new()
        .route("/.well-known/webfinger", get(webfinger))
        .route("/.well-known/nodeinfo", get(nodeinfo_links))
        .route("/nodeinfo/2.0", get(nodeinfo))
}

/// WebFinger JRD response
#[derive(Debug, Clone, Serialize)]
pub struct WebFingerResponse {
    pub subject: String,
    pub aliases: Vec<String>,
    pub links: Vec<WebFingerLink>,
}

/// WebFinger link
#[derive(Debug, Clone, Serialize)]
pub struct WebFingerLink {
    pub rel: String,
    #[serde(rename = "type")]
    pub link_type: String,
    pub href: String,
}

/// WebFinger query parameters
#[derive(Debug, Deserialize)]
struct WebFingerQuery {
    resource: String,
}

/// GET /.well-known/webfinger
///
/// Responds to WebFinger queries for local accounts.
///
/// Query: ?resource=acct:user@domain
async fn webfinger(
    State(state): State<AppState>,
    Query(query): Query<WebFingerQuery>,
) -> Result<Json<WebFingerResponse>, AppError> {
    let resource = &query.resource;

    let Some(acct) = resource.strip_prefix("acct:") else {
        return Err(AppError::Validation(
            "Resource must start with 'acct:'".to_string(),
        ));
    };

    let Some((username, domain)) = acct.split_once('@') else {
        return Err(AppError::Validation(
            "Resource must be acct:user@domain".to_string(),
        ));
    };

    if !domain.eq_ignore_ascii_case(&state.config.server.domain) {
        return Err(AppError::NotFound);
    }

    let actor = state
        .db
        .get_local_actor_by_username(username)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(WebFingerResponse {
        subject: format!("acct:{}@{}", actor.username, state.config.server.domain),
        aliases: actor.url.iter().cloned().collect(),
        links: vec![WebFingerLink {
            rel: "self".to_string(),
            link_type: "application/activity+json".to_string(),
            href: actor.iri,
        }],
    }))
}

/// GET /.well-known/nodeinfo
///
/// Returns links to nodeinfo documents.
async fn nodeinfo_links(State(state): State<AppState>) -> Json<serde_json::Value> {
    let base_url = state.config.server.base_url();
    Json(serde_json::json!({
        "links": [
            {
                "rel": "http://nodeinfo.diaspora.software/ns/schema/2.0",
                "href": format!("{}/nodeinfo/2.0", base_url)
            }
        ]
    }))
}

/// GET /nodeinfo/2.0
///
/// Returns NodeInfo 2.0 document.
async fn nodeinfo(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let users = state.db.count_active_accounts().await?;

    Ok(Json(serde_json::json!({
        "version": "2.0",
        "software": {
            "name": SOFTWARE_NAME,
            "version": SOFTWARE_VERSION
        },
        "protocols": ["activitypub"],
        "services": {
            "inbound": [],
            "outbound": []
        },
        "openRegistrations": false,
        "usage": {
            "users": {
                "total": users
            }
        },
        "metadata": {
            "nodeName": state.config.instance.title,
            "nodeDescription": state.config.instance.description,
            "contactEmail": state.config.instance.contact_email
        }
    })))
}
