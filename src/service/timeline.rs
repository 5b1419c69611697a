//! Timeline service
//!
//! Publishing posts and reading the public timeline.

use std::sync::Arc;

use chrono::Utc;

use crate::data::{Account, Database, EntityId, Post, TimelineEntry};
use crate::error::AppError;
use crate::federation::{FederationContext, RelationshipEngine};

/// Longest accepted post body, measured before sanitization
const MAX_POST_CHARS: usize = 5000;

const DEFAULT_TIMELINE_LIMIT: i64 = 40;
const MAX_TIMELINE_LIMIT: i64 = 100;

/// Timeline service
pub struct TimelineService {
    db: Arc<Database>,
    engine: Arc<RelationshipEngine>,
}

impl TimelineService {
    /// Create new timeline service
    pub fn new(db: Arc<Database>, engine: Arc<RelationshipEngine>) -> Self {
        Self { db, engine }
    }

    /// Publish a post for an active account.
    ///
    /// Content is sanitized before storage; the author's actor record is
    /// created on demand and its posts counter refreshed with the insert.
    pub async fn publish(
        &self,
        ctx: &FederationContext,
        account: &Account,
        content: &str,
    ) -> Result<Post, AppError> {
        if !account.is_active() {
            return Err(AppError::Forbidden);
        }

        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("post content is empty".to_string()));
        }
        if content.chars().count() > MAX_POST_CHARS {
            return Err(AppError::Validation(format!(
                "post content exceeds {} characters",
                MAX_POST_CHARS
            )));
        }

        let actor = match self.db.get_actor_for_account(&account.id).await? {
            Some(actor) => actor,
            None => self.engine.sync_actor_from_account(ctx, account).await?,
        };

        let post = Post {
            id: EntityId::new().0,
            actor_id: actor.id.clone(),
            content: ammonia::clean(content),
            iri: format!("{}/posts/{}", actor.iri, EntityId::new().0),
            published_at: Utc::now(),
        };
        self.db.insert_post(&post).await?;

        tracing::info!(post_id = %post.id, author = %actor.handle, "Post published");
        Ok(post)
    }

    /// The public timeline, newest first.
    pub async fn timeline(&self, limit: Option<i64>) -> Result<Vec<TimelineEntry>, AppError> {
        let limit = limit
            .unwrap_or(DEFAULT_TIMELINE_LIMIT)
            .clamp(1, MAX_TIMELINE_LIMIT);
        self.db.list_recent_posts(limit).await
    }

    /// Posts by one local account, newest first.
    pub async fn posts_for_account(
        &self,
        account_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Post>, AppError> {
        let Some(actor) = self.db.get_actor_for_account(account_id).await? else {
            return Ok(Vec::new());
        };
        let limit = limit
            .unwrap_or(DEFAULT_TIMELINE_LIMIT)
            .clamp(1, MAX_TIMELINE_LIMIT);
        self.db.list_posts_by_actor(&actor.id, limit).await
    }
}
