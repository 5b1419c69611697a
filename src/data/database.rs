//! SQLite database operations
//!
//! All database access goes through this module.
//! Race safety is carried by single-statement conditional updates and
//! `ON CONFLICT` clauses, not by in-process locks.

use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqlitePool};

use super::models::*;
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to the SQLite database and run migrations
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let options = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
        })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Insert a new account
    pub async fn insert_account(&self, account: &Account) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, username, email, intro, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.intro)
        .bind(&account.status)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get account by ID
    pub async fn get_account(&self, id: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// Get account by email
    pub async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// Get account by username
    pub async fn get_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// Count active accounts
    pub async fn count_active_accounts(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT count(*) FROM accounts WHERE status = 'active'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // =========================================================================
    // Signup requests
    // =========================================================================

    /// Insert a new signup request (state starts as pending)
    pub async fn insert_signup_request(&self, request: &SignupRequest) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO signup_requests (
                id, username, email, intro, state, invitation_account_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.id)
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.intro)
        .bind(&request.state)
        .bind(&request.invitation_account_id)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get signup request by ID
    pub async fn get_signup_request(&self, id: &str) -> Result<Option<SignupRequest>, AppError> {
        let request =
            sqlx::query_as::<_, SignupRequest>("SELECT * FROM signup_requests WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(request)
    }

    /// Find a signup request by email, newest first
    pub async fn find_signup_request_by_email(
        &self,
        email: &str,
    ) -> Result<Option<SignupRequest>, AppError> {
        let request = sqlx::query_as::<_, SignupRequest>(
            "SELECT * FROM signup_requests WHERE email = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    /// List signup requests, optionally filtered by state
    pub async fn list_signup_requests(
        &self,
        state: Option<&str>,
    ) -> Result<Vec<SignupRequest>, AppError> {
        let requests = match state {
            Some(state) => {
                sqlx::query_as::<_, SignupRequest>(
                    "SELECT * FROM signup_requests WHERE state = ? ORDER BY created_at ASC",
                )
                .bind(state)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SignupRequest>(
                    "SELECT * FROM signup_requests ORDER BY created_at ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(requests)
    }

    /// Move a pending request to approved and link the invited account.
    ///
    /// Guarded by `state = 'pending'`; a non-pending request affects zero
    /// rows and the call reports false.
    pub async fn approve_signup_request(
        &self,
        id: &str,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE signup_requests
            SET state = 'approved', invitation_account_id = ?, updated_at = ?
            WHERE id = ? AND state = 'pending'
            "#,
        )
        .bind(account_id)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Move a pending request to rejected.
    pub async fn reject_signup_request(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE signup_requests SET state = 'rejected', updated_at = ? WHERE id = ? AND state = 'pending'",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Complete a signup: request approved -> completed, account invited -> active.
    ///
    /// Both updates run inside one IMMEDIATE transaction and each must hit
    /// exactly one row; anything else rolls back and reports false.
    pub async fn complete_signup(
        &self,
        request_id: &str,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result: Result<bool, AppError> = async {
            let request = sqlx::query(
                "UPDATE signup_requests SET state = 'completed', updated_at = ? WHERE id = ? AND state = 'approved'",
            )
            .bind(now)
            .bind(request_id)
            .execute(&mut *conn)
            .await?;
            if request.rows_affected() != 1 {
                return Ok(false);
            }

            let account = sqlx::query(
                "UPDATE accounts SET status = 'active', updated_at = ? WHERE id = ? AND status = 'invited'",
            )
            .bind(now)
            .bind(account_id)
            .execute(&mut *conn)
            .await?;

            Ok(account.rows_affected() == 1)
        }
        .await;

        match result {
            Ok(true) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(true)
            }
            Ok(false) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Ok(false)
            }
            Err(error) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(error)
            }
        }
    }

    // =========================================================================
    // Magic links
    // =========================================================================

    /// Insert a new magic link row
    pub async fn insert_magic_link(&self, link: &MagicLink) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO magic_links (
                id, account_id, request_id, token_hash, token_type,
                expires_at, consumed_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&link.id)
        .bind(&link.account_id)
        .bind(&link.request_id)
        .bind(&link.token_hash)
        .bind(&link.token_type)
        .bind(link.expires_at)
        .bind(link.consumed_at)
        .bind(link.created_at)
        .bind(link.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get magic link by ID
    pub async fn get_magic_link(&self, id: &str) -> Result<Option<MagicLink>, AppError> {
        let link = sqlx::query_as::<_, MagicLink>("SELECT * FROM magic_links WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(link)
    }

    /// List unconsumed magic links of one type, newest first.
    ///
    /// There is deliberately no lookup by token value; callers compare the
    /// presented secret against each stored hash.
    pub async fn list_unconsumed_magic_links(
        &self,
        token_type: &str,
    ) -> Result<Vec<MagicLink>, AppError> {
        let links = sqlx::query_as::<_, MagicLink>(
            "SELECT * FROM magic_links WHERE consumed_at IS NULL AND token_type = ? ORDER BY created_at DESC",
        )
        .bind(token_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    /// Consume a magic link exactly once.
    ///
    /// The `consumed_at IS NULL` guard makes this a single atomic
    /// statement; a concurrent loser affects zero rows.
    pub async fn consume_magic_link(&self, id: &str, now: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE magic_links SET consumed_at = ?, updated_at = ? WHERE id = ? AND consumed_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Instances
    // =========================================================================

    /// Upsert an instance row keyed by host
    pub async fn upsert_instance(&self, instance: &Instance) -> Result<Instance, AppError> {
        let row = sqlx::query_as::<_, Instance>(
            r#"
            INSERT INTO instances (host, software, software_version, created, updated)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(host) DO UPDATE SET
                software = excluded.software,
                software_version = excluded.software_version,
                updated = excluded.updated
            RETURNING *
            "#,
        )
        .bind(&instance.host)
        .bind(&instance.software)
        .bind(&instance.software_version)
        .bind(instance.created)
        .bind(instance.updated)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    // =========================================================================
    // Actors
    // =========================================================================

    /// Upsert the actor for a local account, keyed by `account_id`.
    ///
    /// Safe to call repeatedly; a conflict refreshes the mutable fields
    /// without duplicating rows or resetting counters.
    pub async fn upsert_actor_for_account(&self, actor: &Actor) -> Result<Actor, AppError> {
        sqlx::query(
            r#"
            INSERT INTO actors (
                id, iri, actor_type, username, instance_host, handle_host,
                preferred_username, account_id, name, automatically_approves_followers,
                inbox_url, shared_inbox_url, followers_url, url,
                created_at, updated_at, published_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_id) DO UPDATE SET
                iri = excluded.iri,
                actor_type = excluded.actor_type,
                username = excluded.username,
                instance_host = excluded.instance_host,
                handle_host = excluded.handle_host,
                preferred_username = excluded.preferred_username,
                name = excluded.name,
                automatically_approves_followers = excluded.automatically_approves_followers,
                inbox_url = excluded.inbox_url,
                shared_inbox_url = excluded.shared_inbox_url,
                followers_url = excluded.followers_url,
                url = excluded.url,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&actor.id)
        .bind(&actor.iri)
        .bind(&actor.actor_type)
        .bind(&actor.username)
        .bind(&actor.instance_host)
        .bind(&actor.handle_host)
        .bind(&actor.preferred_username)
        .bind(&actor.account_id)
        .bind(&actor.name)
        .bind(actor.automatically_approves_followers)
        .bind(&actor.inbox_url)
        .bind(&actor.shared_inbox_url)
        .bind(&actor.followers_url)
        .bind(&actor.url)
        .bind(actor.created_at)
        .bind(actor.updated_at)
        .bind(actor.published_at)
        .execute(&self.pool)
        .await?;

        // The generated handle column is only materialized on read
        let account_id = actor.account_id.as_deref().ok_or_else(|| {
            AppError::Validation("local actor upsert requires an account".to_string())
        })?;
        let row = self
            .get_actor_for_account(account_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("actor missing after upsert"))?;

        Ok(row)
    }

    /// Upsert a remote actor, keyed by IRI.
    pub async fn upsert_remote_actor(&self, actor: &Actor) -> Result<Actor, AppError> {
        sqlx::query(
            r#"
            INSERT INTO actors (
                id, iri, actor_type, username, instance_host, handle_host,
                preferred_username, account_id, name, automatically_approves_followers,
                inbox_url, shared_inbox_url, followers_url, url,
                created_at, updated_at, published_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(iri) DO UPDATE SET
                name = excluded.name,
                inbox_url = excluded.inbox_url,
                shared_inbox_url = excluded.shared_inbox_url,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&actor.id)
        .bind(&actor.iri)
        .bind(&actor.actor_type)
        .bind(&actor.username)
        .bind(&actor.instance_host)
        .bind(&actor.handle_host)
        .bind(&actor.preferred_username)
        .bind(&actor.account_id)
        .bind(&actor.name)
        .bind(actor.automatically_approves_followers)
        .bind(&actor.inbox_url)
        .bind(&actor.shared_inbox_url)
        .bind(&actor.followers_url)
        .bind(&actor.url)
        .bind(actor.created_at)
        .bind(actor.updated_at)
        .bind(actor.published_at)
        .execute(&self.pool)
        .await?;

        let row = self
            .get_actor_by_iri(&actor.iri)
            .await?
            .ok_or_else(|| anyhow::anyhow!("actor missing after upsert"))?;

        Ok(row)
    }

    /// Get actor by ID
    pub async fn get_actor(&self, id: &str) -> Result<Option<Actor>, AppError> {
        let actor = sqlx::query_as::<_, Actor>("SELECT * FROM actors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(actor)
    }

    /// Get actor by IRI
    pub async fn get_actor_by_iri(&self, iri: &str) -> Result<Option<Actor>, AppError> {
        let actor = sqlx::query_as::<_, Actor>("SELECT * FROM actors WHERE iri = ?")
            .bind(iri)
            .fetch_optional(&self.pool)
            .await?;
        Ok(actor)
    }

    /// Get the actor backing a local account
    pub async fn get_actor_for_account(
        &self,
        account_id: &str,
    ) -> Result<Option<Actor>, AppError> {
        let actor = sqlx::query_as::<_, Actor>("SELECT * FROM actors WHERE account_id = ?")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(actor)
    }

    /// Get a local actor by username
    pub async fn get_local_actor_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Actor>, AppError> {
        let actor = sqlx::query_as::<_, Actor>(
            "SELECT * FROM actors WHERE username = ? AND account_id IS NOT NULL",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(actor)
    }

    // =========================================================================
    // Followings
    // =========================================================================

    /// Insert a follow edge; a duplicate (follower, followee) pair is ignored.
    ///
    /// Returns the inserted row, or None when the edge already existed.
    pub async fn insert_following(
        &self,
        following: &Following,
    ) -> Result<Option<Following>, AppError> {
        let row = sqlx::query_as::<_, Following>(
            r#"
            INSERT INTO followings (iri, follower_id, followee_id, accepted, created)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&following.iri)
        .bind(&following.follower_id)
        .bind(&following.followee_id)
        .bind(following.accepted)
        .bind(following.created)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Get a follow edge by (follower, followee) pair
    pub async fn get_following(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> Result<Option<Following>, AppError> {
        let row = sqlx::query_as::<_, Following>(
            "SELECT * FROM followings WHERE follower_id = ? AND followee_id = ?",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Mark a pending edge accepted, addressed by its IRI.
    ///
    /// Guarded by `accepted IS NULL`; re-accepting affects zero rows and
    /// returns None.
    pub async fn accept_following_by_iri(
        &self,
        iri: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Following>, AppError> {
        let row = sqlx::query_as::<_, Following>(
            "UPDATE followings SET accepted = ? WHERE iri = ? AND accepted IS NULL RETURNING *",
        )
        .bind(now)
        .bind(iri)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Mark a pending edge accepted, addressed by its (follower, followee) pair.
    pub async fn accept_following_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Following>, AppError> {
        let row = sqlx::query_as::<_, Following>(
            r#"
            UPDATE followings SET accepted = ?
            WHERE follower_id = ? AND followee_id = ? AND accepted IS NULL
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(follower_id)
        .bind(followee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Delete a follow edge by (follower, followee) pair, returning it.
    pub async fn delete_following(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> Result<Option<Following>, AppError> {
        let row = sqlx::query_as::<_, Following>(
            "DELETE FROM followings WHERE follower_id = ? AND followee_id = ? RETURNING *",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Delete a follow edge by IRI, returning it.
    pub async fn delete_following_by_iri(
        &self,
        iri: &str,
    ) -> Result<Option<Following>, AppError> {
        let row = sqlx::query_as::<_, Following>(
            "DELETE FROM followings WHERE iri = ? RETURNING *",
        )
        .bind(iri)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Adjust an actor's followees counter.
    ///
    /// Remote actors (no linked account) take the delta as-is; local
    /// actors are recomputed from accepted edges inside the same
    /// statement, so the count can never drift from ground truth.
    pub async fn update_followees_count(
        &self,
        actor_id: &str,
        delta: i64,
    ) -> Result<Option<Actor>, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE actors SET
                followees_count = CASE
                    WHEN account_id IS NULL THEN followees_count + ?
                    ELSE (
                        SELECT count(*) FROM followings
                        WHERE follower_id = ? AND accepted IS NOT NULL
                    )
                END,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(delta)
        .bind(actor_id)
        .bind(Utc::now())
        .bind(actor_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_actor(actor_id).await
    }

    /// Adjust an actor's followers counter; same policy as
    /// [`Database::update_followees_count`].
    pub async fn update_followers_count(
        &self,
        actor_id: &str,
        delta: i64,
    ) -> Result<Option<Actor>, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE actors SET
                followers_count = CASE
                    WHEN account_id IS NULL THEN followers_count + ?
                    ELSE (
                        SELECT count(*) FROM followings
                        WHERE followee_id = ? AND accepted IS NOT NULL
                    )
                END,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(delta)
        .bind(actor_id)
        .bind(Utc::now())
        .bind(actor_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_actor(actor_id).await
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert a post and refresh the author's posts counter.
    pub async fn insert_post(&self, post: &Post) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO posts (id, actor_id, content, iri, published_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&post.id)
        .bind(&post.actor_id)
        .bind(&post.content)
        .bind(&post.iri)
        .bind(post.published_at)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            UPDATE actors SET
                posts_count = (SELECT count(*) FROM posts WHERE actor_id = ?),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&post.actor_id)
        .bind(Utc::now())
        .bind(&post.actor_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Recent posts joined with their authors, newest first.
    pub async fn list_recent_posts(&self, limit: i64) -> Result<Vec<TimelineEntry>, AppError> {
        let entries = sqlx::query_as::<_, TimelineEntry>(
            r#"
            SELECT p.id, p.content, p.iri, p.published_at,
                   a.id AS actor_id, a.handle AS actor_handle, a.name AS actor_name
            FROM posts p
            JOIN actors a ON a.id = p.actor_id
            ORDER BY p.published_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Posts by one actor, newest first.
    pub async fn list_posts_by_actor(
        &self,
        actor_id: &str,
        limit: i64,
    ) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(
            "SELECT * FROM posts WHERE actor_id = ? ORDER BY published_at DESC LIMIT ?",
        )
        .bind(actor_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    // =========================================================================
    // Instance signing key
    // =========================================================================

    /// Get the instance signing key, if one was generated.
    pub async fn get_instance_key(&self) -> Result<Option<String>, AppError> {
        let pem = sqlx::query_scalar::<_, String>(
            "SELECT private_key_pem FROM instance_keys WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(pem)
    }

    /// Store the instance signing key unless one already exists.
    ///
    /// Returns true when this call inserted the key.
    pub async fn insert_instance_key(
        &self,
        private_key_pem: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO instance_keys (id, private_key_pem, created_at) VALUES (1, ?, ?)",
        )
        .bind(private_key_pem)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
