//! Follow relationship engine
//!
//! Keeps actor records in sync with local accounts and drives the
//! follow/unfollow/accept state machine, emitting outbound activities
//! and maintaining the denormalized follower/followee counters.
//!
//! Counter policy: counters of remote actors move by trusted deltas (we
//! are the only writer of their edges on this side); counters of local
//! actors are recomputed from accepted edges inside the same UPDATE, so
//! concurrent request handling cannot make them drift.

use std::sync::Arc;

use chrono::Utc;

use super::FederationContext;
use super::context::{SOFTWARE_NAME, SOFTWARE_VERSION};
use crate::data::{Account, Actor, ActorType, Database, EntityId, Following, Instance};
use crate::error::AppError;

/// Follow relationship engine
pub struct RelationshipEngine {
    db: Arc<Database>,
}

impl RelationshipEngine {
    /// Create new relationship engine
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Sync a local account into its actor record.
    ///
    /// Upserts the local instance row, then upserts the actor keyed by
    /// account. Safe to call repeatedly; repeated calls refresh the
    /// mutable fields without duplicating rows.
    pub async fn sync_actor_from_account(
        &self,
        ctx: &FederationContext,
        account: &Account,
    ) -> Result<Actor, AppError> {
        let now = Utc::now();
        let instance = self
            .db
            .upsert_instance(&Instance {
                host: ctx.host().to_string(),
                software: Some(SOFTWARE_NAME.to_string()),
                software_version: Some(SOFTWARE_VERSION.to_string()),
                created: now,
                updated: now,
            })
            .await?;

        let actor = Actor {
            id: EntityId::new().0,
            iri: ctx.actor_uri(&account.username),
            actor_type: ActorType::Person.as_str().to_string(),
            username: account.username.clone(),
            instance_host: instance.host.clone(),
            handle_host: instance.host,
            handle: String::new(),
            preferred_username: account.username.clone(),
            account_id: Some(account.id.clone()),
            name: Some(account.username.clone()),
            automatically_approves_followers: true,
            inbox_url: ctx.inbox_uri(&account.username),
            shared_inbox_url: Some(ctx.shared_inbox_uri()),
            followers_url: Some(ctx.followers_uri(&account.username)),
            url: Some(ctx.profile_url(&account.username)),
            followees_count: 0,
            followers_count: 0,
            posts_count: 0,
            created_at: account.created_at,
            updated_at: account.updated_at,
            published_at: Some(account.created_at),
        };

        self.db.upsert_actor_for_account(&actor).await
    }

    /// Ensure a remote actor has instance and actor rows.
    ///
    /// Synthesizes the minimum from the actor IRI when no actor document
    /// is supplied (inbox defaults to `<iri>/inbox`).
    pub async fn ensure_remote_actor(
        &self,
        actor_iri: &str,
        document: Option<&serde_json::Value>,
    ) -> Result<Actor, AppError> {
        let parsed = url::Url::parse(actor_iri)
            .map_err(|e| AppError::Validation(format!("Invalid actor IRI: {}", e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| AppError::Validation("Actor IRI has no host".to_string()))?
            .to_string();

        let username = document
            .and_then(|d| d.get("preferredUsername"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| {
                parsed
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .filter(|segment| !segment.is_empty())
                    .map(|segment| segment.trim_start_matches('@').to_string())
            })
            .unwrap_or_else(|| host.clone());

        let inbox_url = document
            .and_then(|d| d.get("inbox"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/inbox", actor_iri.trim_end_matches('/')));
        let shared_inbox_url = document
            .and_then(|d| d.pointer("/endpoints/sharedInbox"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let name = document
            .and_then(|d| d.get("name"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let actor_type = document
            .and_then(|d| d.get("type"))
            .and_then(|v| v.as_str())
            .filter(|t| {
                matches!(
                    *t,
                    "Application" | "Group" | "Organization" | "Person" | "Service"
                )
            })
            .unwrap_or("Person");

        let now = Utc::now();
        self.db
            .upsert_instance(&Instance {
                host: host.clone(),
                software: None,
                software_version: None,
                created: now,
                updated: now,
            })
            .await?;

        self.db
            .upsert_remote_actor(&Actor {
                id: EntityId::new().0,
                iri: actor_iri.to_string(),
                actor_type: actor_type.to_string(),
                username: username.clone(),
                instance_host: host.clone(),
                handle_host: host,
                handle: String::new(),
                preferred_username: username,
                account_id: None,
                name,
                automatically_approves_followers: true,
                inbox_url,
                shared_inbox_url,
                followers_url: None,
                url: None,
                followees_count: 0,
                followers_count: 0,
                posts_count: 0,
                created_at: now,
                updated_at: now,
                published_at: None,
            })
            .await
    }

    /// Follow another actor on behalf of a local one.
    ///
    /// A duplicate (follower, followee) pair is ignored and returns
    /// None. A new edge to a local followee is accepted immediately and
    /// both counters move; a new edge to a remote followee stays pending
    /// and a Follow activity goes out instead.
    pub async fn follow(
        &self,
        ctx: &FederationContext,
        follower: &Actor,
        followee: &Actor,
    ) -> Result<Option<Following>, AppError> {
        if !follower.is_local() {
            return Err(AppError::Validation(
                "follow must originate from a local actor".to_string(),
            ));
        }

        let now = Utc::now();
        let edge = Following {
            iri: format!("{}#follow/{}", follower.iri, EntityId::new().0),
            follower_id: follower.id.clone(),
            followee_id: followee.id.clone(),
            accepted: followee.is_local().then_some(now),
            created: now,
        };

        let Some(inserted) = self.db.insert_following(&edge).await? else {
            tracing::debug!(
                follower = %follower.handle,
                followee = %followee.handle,
                "Follow edge already exists"
            );
            return Ok(None);
        };

        if followee.is_local() {
            // No network hop; the edge is born accepted and counts move now
            self.db
                .update_followees_count(&inserted.follower_id, 1)
                .await?;
            self.db
                .update_followers_count(&inserted.followee_id, 1)
                .await?;
        } else {
            // The local edge is already committed; a failed send is logged
            // and not rolled back
            if let Err(error) = ctx
                .delivery()
                .send_follow(&inserted.iri, &follower.iri, followee)
                .await
            {
                tracing::warn!(
                    error = %error,
                    followee = %followee.iri,
                    "Failed to deliver Follow activity"
                );
            }
        }

        Ok(Some(inserted))
    }

    /// Accept a pending follow edge addressed by its activity IRI.
    ///
    /// Used when a remote Accept arrives for a Follow we sent, and when
    /// an inbound Follow at a local followee is auto-accepted. Accepting
    /// an edge that is not pending is a no-op returning None.
    pub async fn accept_following_by_iri(
        &self,
        iri: &str,
    ) -> Result<Option<Following>, AppError> {
        let accepted = self.db.accept_following_by_iri(iri, Utc::now()).await?;
        if let Some(ref edge) = accepted {
            self.db.update_followees_count(&edge.follower_id, 1).await?;
            self.db.update_followers_count(&edge.followee_id, 1).await?;
        }
        Ok(accepted)
    }

    /// Accept a pending follow edge addressed by its (follower, followee)
    /// pair. Used by local approval flows.
    pub async fn accept_following(
        &self,
        follower: &Actor,
        followee: &Actor,
    ) -> Result<Option<Following>, AppError> {
        let accepted = self
            .db
            .accept_following_pair(&follower.id, &followee.id, Utc::now())
            .await?;
        if let Some(ref edge) = accepted {
            self.db.update_followees_count(&edge.follower_id, 1).await?;
            self.db.update_followers_count(&edge.followee_id, 1).await?;
        }
        Ok(accepted)
    }

    /// Retract a follow from the follower's side.
    ///
    /// Deleting a missing edge returns None and touches nothing. A
    /// remote followee gets an Undo(Follow) for the retracted edge.
    pub async fn unfollow(
        &self,
        ctx: &FederationContext,
        follower: &Actor,
        followee: &Actor,
    ) -> Result<Option<Following>, AppError> {
        let Some(removed) = self.db.delete_following(&follower.id, &followee.id).await? else {
            return Ok(None);
        };

        if !followee.is_local() {
            if let Err(error) = ctx
                .delivery()
                .send_undo_follow(&removed.iri, &follower.iri, followee)
                .await
            {
                tracing::warn!(
                    error = %error,
                    followee = %followee.iri,
                    "Failed to deliver Undo(Follow) activity"
                );
            }
        }

        self.db
            .update_followees_count(&removed.follower_id, -1)
            .await?;
        self.db
            .update_followers_count(&removed.followee_id, -1)
            .await?;

        Ok(Some(removed))
    }

    /// Remove a follower from the followee's side.
    ///
    /// A remote follower is told with a Reject(Follow) addressed at its
    /// inbox.
    pub async fn remove_follower(
        &self,
        ctx: &FederationContext,
        followee: &Actor,
        follower: &Actor,
    ) -> Result<Option<Following>, AppError> {
        let Some(removed) = self.db.delete_following(&follower.id, &followee.id).await? else {
            return Ok(None);
        };

        self.db
            .update_followees_count(&removed.follower_id, -1)
            .await?;
        self.db
            .update_followers_count(&removed.followee_id, -1)
            .await?;

        if !follower.is_local() {
            if let Err(error) = ctx
                .delivery()
                .send_reject_follow(&followee.iri, &removed.iri, follower)
                .await
            {
                tracing::warn!(
                    error = %error,
                    follower = %follower.iri,
                    "Failed to deliver Reject(Follow) activity"
                );
            }
        }

        Ok(Some(removed))
    }

    /// Drop a follow edge by its activity IRI (inbound Undo).
    pub async fn remove_following_by_iri(
        &self,
        iri: &str,
    ) -> Result<Option<Following>, AppError> {
        let Some(removed) = self.db.delete_following_by_iri(iri).await? else {
            return Ok(None);
        };

        self.db
            .update_followees_count(&removed.follower_id, -1)
            .await?;
        self.db
            .update_followers_count(&removed.followee_id, -1)
            .await?;

        Ok(Some(removed))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared helpers for federation tests: temp databases, a context
    //! wired at a capturing inbox server, and row builders.

    use std::sync::{Arc, Mutex};

    use axum::{Router, extract::State, routing::post};
    use chrono::Utc;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    use super::*;
    use crate::data::AccountStatus;
    use crate::federation::ActivityDelivery;

    /// Activities captured by the test inbox server
    pub type CapturedActivities = Arc<Mutex<Vec<serde_json::Value>>>;

    pub async fn create_test_db() -> (Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("federation.db");
        let db = Arc::new(Database::connect(&db_path).await.unwrap());
        (db, temp_dir)
    }

    /// Spawn an inbox endpoint that records every posted activity.
    pub async fn spawn_inbox_server() -> (String, CapturedActivities) {
        let captured: CapturedActivities = Arc::new(Mutex::new(Vec::new()));

        async fn record(
            State(captured): State<CapturedActivities>,
            body: String,
        ) -> http::StatusCode {
            if let Ok(activity) = serde_json::from_str(&body) {
                captured.lock().unwrap().push(activity);
            }
            http::StatusCode::ACCEPTED
        }

        let app = Router::new()
            .route("/inbox", post(record))
            .with_state(captured.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), captured)
    }

    /// Context delivering with a throwaway key; sends go to `remote_base`.
    pub fn create_test_context() -> FederationContext {
        let pem = crate::federation::generate_private_key_pem(2048).unwrap();
        let delivery = Arc::new(ActivityDelivery::new(
            Arc::new(reqwest::Client::new()),
            "https://local.example/ap/actors/local.example#main-key".to_string(),
            pem,
        ));
        FederationContext::new(
            "https://local.example".to_string(),
            "local.example".to_string(),
            delivery,
        )
    }

    pub async fn insert_local_account(db: &Database, username: &str) -> Account {
        let now = Utc::now();
        let account = Account {
            id: EntityId::new().0,
            username: username.to_string(),
            email: format!("{}@example.com", username),
            intro: None,
            status: AccountStatus::Active.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        db.insert_account(&account).await.unwrap();
        account
    }

    /// A remote actor whose personal inbox points at the capture server.
    pub async fn insert_remote_actor(
        db: &Database,
        username: &str,
        inbox_base: &str,
    ) -> Actor {
        let now = Utc::now();
        db.upsert_instance(&Instance {
            host: "remote.example".to_string(),
            software: None,
            software_version: None,
            created: now,
            updated: now,
        })
        .await
        .unwrap();

        db.upsert_remote_actor(&Actor {
            id: EntityId::new().0,
            iri: format!("https://remote.example/ap/actors/{}", username),
            actor_type: ActorType::Person.as_str().to_string(),
            username: username.to_string(),
            instance_host: "remote.example".to_string(),
            handle_host: "remote.example".to_string(),
            handle: String::new(),
            preferred_username: username.to_string(),
            account_id: None,
            name: None,
            automatically_approves_followers: true,
            inbox_url: format!("{}/inbox", inbox_base),
            shared_inbox_url: None,
            followers_url: None,
            url: None,
            followees_count: 0,
            followers_count: 0,
            posts_count: 0,
            created_at: now,
            updated_at: now,
            published_at: None,
        })
        .await
        .unwrap()
    }
}
