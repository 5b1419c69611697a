//! Inbound activity processing
//!
//! Handles the relationship activities a peer may deliver to an inbox:
//! Follow (a remote actor follows a local one), Accept (a Follow we
//! sent was approved) and Undo(Follow) (a remote follower left).
//! Everything else is acknowledged and ignored.

use std::sync::Arc;

use super::{FederationContext, RelationshipEngine};
use crate::data::{Database, EntityId, Following};
use crate::error::AppError;

/// Inbound activity types this processor understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityType {
    Follow,
    Accept,
    Undo,
}

impl ActivityType {
    /// Parse activity type from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Follow" => Some(Self::Follow),
            "Accept" => Some(Self::Accept),
            "Undo" => Some(Self::Undo),
            _ => None,
        }
    }
}

/// Extract the actor of an activity: a bare IRI string or an embedded
/// actor object with an `id`.
fn extract_actor(activity: &serde_json::Value) -> Result<(String, Option<&serde_json::Value>), AppError> {
    match activity.get("actor") {
        Some(serde_json::Value::String(iri)) => Ok((iri.clone(), None)),
        Some(object) if object.is_object() => {
            let iri = object
                .get("id")
                .and_then(|id| id.as_str())
                .ok_or_else(|| AppError::Validation("Activity actor has no id".to_string()))?;
            Ok((iri.to_string(), Some(object)))
        }
        _ => Err(AppError::Validation(
            "Activity is missing an actor".to_string(),
        )),
    }
}

/// Extract an object reference: a bare IRI string or an object with `id`.
fn extract_object_iri(value: &serde_json::Value) -> Result<String, AppError> {
    match value.get("object") {
        Some(serde_json::Value::String(iri)) => Ok(iri.clone()),
        Some(object) if object.is_object() => object
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("Activity object has no id".to_string())),
        _ => Err(AppError::Validation(
            "Activity is missing an object".to_string(),
        )),
    }
}

/// Inbound activity processor
pub struct ActivityProcessor {
    db: Arc<Database>,
    engine: Arc<RelationshipEngine>,
}

impl ActivityProcessor {
    /// Create new activity processor
    pub fn new(db: Arc<Database>, engine: Arc<RelationshipEngine>) -> Self {
        Self { db, engine }
    }

    /// Process an incoming activity
    ///
    /// # Arguments
    /// * `ctx` - Federation context for outbound responses
    /// * `activity` - Raw JSON-LD activity
    pub async fn process(
        &self,
        ctx: &FederationContext,
        activity: serde_json::Value,
    ) -> Result<(), AppError> {
        let activity_type_str = activity
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| AppError::Validation("Missing activity type".to_string()))?;

        crate::metrics::ACTIVITIES_RECEIVED_TOTAL
            .with_label_values(&[activity_type_str])
            .inc();

        match ActivityType::from_str(activity_type_str) {
            Some(ActivityType::Follow) => self.handle_follow(ctx, activity).await,
            Some(ActivityType::Accept) => self.handle_accept(activity).await,
            Some(ActivityType::Undo) => self.handle_undo(activity).await,
            None => {
                tracing::debug!(activity_type = activity_type_str, "Ignoring activity");
                Ok(())
            }
        }
    }

    /// Handle an inbound Follow aimed at a local actor.
    ///
    /// The remote sender is materialized into instance/actor rows, the
    /// edge is stored under the Follow activity's own IRI, and local
    /// actors that auto-approve answer with an Accept.
    async fn handle_follow(
        &self,
        ctx: &FederationContext,
        activity: serde_json::Value,
    ) -> Result<(), AppError> {
        let target_iri = extract_object_iri(&activity)?;
        let Some(target) = self.db.get_actor_by_iri(&target_iri).await? else {
            return Err(AppError::Validation(
                "Follow target is not a local actor".to_string(),
            ));
        };
        if !target.is_local() {
            return Err(AppError::Validation(
                "Follow target is not a local actor".to_string(),
            ));
        }

        let (actor_iri, actor_document) = extract_actor(&activity)?;
        let remote = self
            .engine
            .ensure_remote_actor(&actor_iri, actor_document)
            .await?;

        // The inbound activity id keys the edge; a retried Follow without
        // one gets a synthetic IRI and dedupes on the pair constraint.
        let follow_iri = activity
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}#follow/{}", remote.iri, EntityId::new().0));

        let now = chrono::Utc::now();
        let inserted = self
            .db
            .insert_following(&Following {
                iri: follow_iri,
                follower_id: remote.id.clone(),
                followee_id: target.id.clone(),
                accepted: None,
                created: now,
            })
            .await?;

        // A duplicate Follow finds the already stored edge
        let edge = match inserted {
            Some(edge) => edge,
            None => match self.db.get_following(&remote.id, &target.id).await? {
                Some(edge) => edge,
                None => return Ok(()),
            },
        };

        if !target.automatically_approves_followers {
            tracing::info!(
                follower = %remote.iri,
                followee = %target.iri,
                "Follow request stored, awaiting manual approval"
            );
            return Ok(());
        }

        // Accept locally first; answering the peer can fail without
        // unwinding the edge
        self.engine.accept_following_by_iri(&edge.iri).await?;

        if let Err(error) = ctx
            .delivery()
            .send_accept_follow(&target.iri, &edge.iri, &remote)
            .await
        {
            tracing::warn!(
                error = %error,
                follower = %remote.iri,
                "Failed to deliver Accept for inbound Follow"
            );
        }

        Ok(())
    }

    /// Handle an Accept for a Follow we sent.
    async fn handle_accept(&self, activity: serde_json::Value) -> Result<(), AppError> {
        let follow_iri = extract_object_iri(&activity)?;

        match self.engine.accept_following_by_iri(&follow_iri).await? {
            Some(edge) => {
                tracing::info!(iri = %edge.iri, "Outbound follow accepted");
            }
            None => {
                tracing::debug!(iri = %follow_iri, "Accept did not match a pending follow");
            }
        }

        Ok(())
    }

    /// Handle an Undo(Follow) from a departing follower.
    async fn handle_undo(&self, activity: serde_json::Value) -> Result<(), AppError> {
        let Some(object) = activity.get("object") else {
            return Err(AppError::Validation(
                "Undo is missing an object".to_string(),
            ));
        };

        let follow_iri = match object {
            // Compact form: object is the Follow activity IRI
            serde_json::Value::String(iri) => iri.clone(),
            object if object.is_object() => {
                let object_type = object.get("type").and_then(|t| t.as_str());
                if object_type != Some("Follow") {
                    tracing::debug!(?object_type, "Ignoring Undo of unsupported object");
                    return Ok(());
                }
                object
                    .get("id")
                    .and_then(|id| id.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        AppError::Validation("Undo Follow object has no id".to_string())
                    })?
            }
            _ => {
                return Err(AppError::Validation(
                    "Undo object is malformed".to_string(),
                ));
            }
        };

        match self.engine.remove_following_by_iri(&follow_iri).await? {
            Some(edge) => {
                tracing::info!(iri = %edge.iri, "Follow retracted by remote actor");
            }
            None => {
                tracing::debug!(iri = %follow_iri, "Undo did not match a stored follow");
            }
        }

        Ok(())
    }
}
