//! Activity delivery
//!
//! Delivers relationship activities (Follow, Accept, Reject, Undo) to
//! remote inboxes as signed `application/activity+json` POSTs. Requests
//! are signed with the instance key; the acting user is named in the
//! activity's `actor` field.

use std::sync::Arc;

use crate::data::{Actor, EntityId};
use crate::error::AppError;

/// Activity delivery service
///
/// Sends activities to remote inbox endpoints.
#[derive(Clone)]
pub struct ActivityDelivery {
    http_client: Arc<reqwest::Client>,
    /// Key ID for signatures (instance actor key)
    key_id: String,
    /// Private key for signing
    private_key_pem: String,
}

/// Pick the inbox to deliver to: shared inbox when the recipient
/// advertises one, personal inbox otherwise.
pub fn recipient_inbox(actor: &Actor) -> &str {
    actor
        .shared_inbox_url
        .as_deref()
        .unwrap_or(&actor.inbox_url)
}

impl ActivityDelivery {
    /// Create new delivery service
    pub fn new(
        http_client: Arc<reqwest::Client>,
        key_id: String,
        private_key_pem: String,
    ) -> Self {
        Self {
            http_client,
            key_id,
            private_key_pem,
        }
    }

    /// Deliver activity to a single inbox
    ///
    /// # Arguments
    /// * `inbox_uri` - Target inbox URL
    /// * `activity` - Activity JSON
    ///
    /// # Errors
    /// Returns error if delivery fails (network, signature, rejection)
    pub async fn deliver_to_inbox(
        &self,
        inbox_uri: &str,
        activity: serde_json::Value,
    ) -> Result<(), AppError> {
        let activity_type = activity
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("unknown")
            .to_string();

        // 1. Serialize activity
        let body = serde_json::to_vec(&activity)
            .map_err(|e| AppError::Validation(format!("Failed to serialize activity: {}", e)))?;

        // 2. Sign request
        let sig_headers = super::sign_request(
            "POST",
            inbox_uri,
            Some(&body),
            &self.private_key_pem,
            &self.key_id,
        )?;

        // 3. POST to inbox with signed headers
        let mut request = self
            .http_client
            .post(inbox_uri)
            .header("Content-Type", "application/activity+json")
            .header("Date", sig_headers.date)
            .header("Signature", sig_headers.signature);

        if let Some(digest) = sig_headers.digest {
            request = request.header("Digest", digest);
        }

        let response = request.body(body).send().await.map_err(|e| {
            AppError::Federation(format!("Failed to deliver to {}: {}", inbox_uri, e))
        })?;

        // 4. Handle response
        if !response.status().is_success() {
            return Err(AppError::Federation(format!(
                "Inbox {} rejected activity: HTTP {}",
                inbox_uri,
                response.status()
            )));
        }

        crate::metrics::ACTIVITIES_SENT_TOTAL
            .with_label_values(&[&activity_type])
            .inc();
        tracing::info!("Successfully delivered activity to {}", inbox_uri);
        Ok(())
    }

    /// Send a Follow activity under an existing activity URI.
    ///
    /// The IRI of the stored follow edge is the activity id, so the
    /// remote side can address its Accept/Reject at the same object.
    pub async fn send_follow(
        &self,
        follow_activity_uri: &str,
        follower_actor_uri: &str,
        followee: &Actor,
    ) -> Result<(), AppError> {
        let activity = builder::follow(follow_activity_uri, follower_actor_uri, &followee.iri);

        self.deliver_to_inbox(recipient_inbox(followee), activity)
            .await?;

        tracing::info!(
            "Sent Follow {} to {} for {}",
            follow_activity_uri,
            recipient_inbox(followee),
            followee.iri
        );

        Ok(())
    }

    /// Send an Accept for an inbound follow request.
    pub async fn send_accept_follow(
        &self,
        followee_actor_uri: &str,
        follow_activity_uri: &str,
        follower: &Actor,
    ) -> Result<(), AppError> {
        let accept_id = format!("{}#accept/{}", followee_actor_uri, EntityId::new().0);
        let activity = builder::accept(
            &accept_id,
            followee_actor_uri,
            serde_json::json!({
                "type": "Follow",
                "id": follow_activity_uri,
                "actor": follower.iri,
                "object": followee_actor_uri
            }),
        );

        self.deliver_to_inbox(recipient_inbox(follower), activity)
            .await?;

        tracing::info!(
            "Sent Accept to {} for Follow {}",
            recipient_inbox(follower),
            follow_activity_uri
        );
        Ok(())
    }

    /// Send a Reject for a removed follower.
    pub async fn send_reject_follow(
        &self,
        followee_actor_uri: &str,
        follow_activity_uri: &str,
        follower: &Actor,
    ) -> Result<(), AppError> {
        let reject_id = format!("{}#reject/{}", followee_actor_uri, EntityId::new().0);
        let activity = builder::reject(
            &reject_id,
            followee_actor_uri,
            serde_json::json!({
                "type": "Follow",
                "id": follow_activity_uri,
                "actor": follower.iri,
                "object": followee_actor_uri
            }),
        );

        self.deliver_to_inbox(recipient_inbox(follower), activity)
            .await?;

        tracing::info!(
            "Sent Reject to {} for Follow {}",
            recipient_inbox(follower),
            follow_activity_uri
        );

        Ok(())
    }

    /// Send an Undo for a retracted follow.
    pub async fn send_undo_follow(
        &self,
        follow_activity_uri: &str,
        follower_actor_uri: &str,
        followee: &Actor,
    ) -> Result<(), AppError> {
        let undo_id = format!("{}#undo/{}", follower_actor_uri, EntityId::new().0);
        let activity = builder::undo(
            &undo_id,
            follower_actor_uri,
            serde_json::json!({
                "type": "Follow",
                "id": follow_activity_uri,
                "actor": follower_actor_uri,
                "object": followee.iri
            }),
        );

        self.deliver_to_inbox(recipient_inbox(followee), activity)
            .await?;

        tracing::info!(
            "Sent Undo to {} for Follow {}",
            recipient_inbox(followee),
            follow_activity_uri
        );
        Ok(())
    }
}

/// Build ActivityPub activity JSON
pub mod builder {
    use serde_json::Value;

    /// Build a Follow activity
    ///
    /// # Arguments
    /// * `id` - Activity ID (unique URI)
    /// * `actor` - Actor URI (follower)
    /// * `object` - Object URI (followee)
    pub fn follow(id: &str, actor: &str, object: &str) -> Value {
        serde_json::json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "type": "Follow",
            "id": id,
            "actor": actor,
            "object": object
        })
    }

    /// Build an Accept activity
    ///
    /// # Arguments
    /// * `id` - Activity ID (unique URI)
    /// * `actor` - Actor URI (accepter)
    /// * `object` - Original activity being accepted (usually a Follow)
    pub fn accept(id: &str, actor: &str, object: Value) -> Value {
        serde_json::json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "type": "Accept",
            "id": id,
            "actor": actor,
            "object": object
        })
    }

    /// Build a Reject activity.
    pub fn reject(id: &str, actor: &str, object: Value) -> Value {
        serde_json::json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "type": "Reject",
            "id": id,
            "actor": actor,
            "object": object
        })
    }

    /// Build an Undo activity
    ///
    /// # Arguments
    /// * `id` - Activity ID (unique URI)
    /// * `actor` - Actor URI (undoer)
    /// * `object` - Original activity being undone
    pub fn undo(id: &str, actor: &str, object: Value) -> Value {
        serde_json::json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "type": "Undo",
            "id": id,
            "actor": actor,
            "object": object
        })
    }
}
