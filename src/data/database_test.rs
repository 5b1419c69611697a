//! Database tests

use super::*;
use chrono::{Duration, Utc};
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

fn make_account(username: &str) -> Account {
    let now = Utc::now();
    Account {
        id: EntityId::new().0,
        username: username.to_string(),
        email: format!("{}@example.com", username),
        intro: None,
        status: AccountStatus::Invited.as_str().to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn make_signup_request(username: &str) -> SignupRequest {
    let now = Utc::now();
    SignupRequest {
        id: EntityId::new().0,
        username: username.to_string(),
        email: format!("{}@example.com", username),
        intro: Some("hello".to_string()),
        state: SignupState::Pending.as_str().to_string(),
        invitation_account_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn make_magic_link(token_type: TokenType, request_id: Option<&str>) -> MagicLink {
    let now = Utc::now();
    MagicLink {
        id: EntityId::new().0,
        account_id: None,
        request_id: request_id.map(str::to_string),
        token_hash: "salt.mac".to_string(),
        token_type: token_type.as_str().to_string(),
        expires_at: now + Duration::minutes(30),
        consumed_at: None,
        created_at: now,
        updated_at: now,
    }
}

async fn make_actor(db: &Database, username: &str, account_id: Option<&str>) -> Actor {
    let host = if account_id.is_some() {
        "local.example"
    } else {
        "remote.example"
    };
    let now = Utc::now();
    db.upsert_instance(&Instance {
        host: host.to_string(),
        software: None,
        software_version: None,
        created: now,
        updated: now,
    })
    .await
    .unwrap();

    let actor = Actor {
        id: EntityId::new().0,
        iri: format!("https://{}/ap/actors/{}", host, username),
        actor_type: ActorType::Person.as_str().to_string(),
        username: username.to_string(),
        instance_host: host.to_string(),
        handle_host: host.to_string(),
        handle: String::new(),
        preferred_username: username.to_string(),
        account_id: account_id.map(str::to_string),
        name: Some(username.to_string()),
        automatically_approves_followers: true,
        inbox_url: format!("https://{}/ap/actors/{}/inbox", host, username),
        shared_inbox_url: Some(format!("https://{}/ap/inbox", host)),
        followers_url: None,
        url: None,
        followees_count: 0,
        followers_count: 0,
        posts_count: 0,
        created_at: now,
        updated_at: now,
        published_at: Some(now),
    };

    if account_id.is_some() {
        db.upsert_actor_for_account(&actor).await.unwrap()
    } else {
        db.upsert_remote_actor(&actor).await.unwrap()
    }
}

fn make_following(follower: &Actor, followee: &Actor, accepted: bool) -> Following {
    let now = Utc::now();
    Following {
        iri: format!("{}#follow/{}", follower.iri, EntityId::new().0),
        follower_id: follower.id.clone(),
        followee_id: followee.id.clone(),
        accepted: accepted.then_some(now),
        created: now,
    }
}

#[tokio::test]
async fn test_database_connection() {
    let (_db, _temp_dir) = create_test_db().await;
    // Connection successful if we get here without panicking
}

#[tokio::test]
async fn test_account_insert_and_lookup() {
    let (db, _temp_dir) = create_test_db().await;

    let account = make_account("alice");
    db.insert_account(&account).await.unwrap();

    let by_id = db.get_account(&account.id).await.unwrap().unwrap();
    assert_eq!(by_id.username, "alice");
    assert_eq!(by_id.status, "invited");

    let by_email = db
        .get_account_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email.id, account.id);

    let by_username = db.get_account_by_username("alice").await.unwrap().unwrap();
    assert_eq!(by_username.id, account.id);

    // Duplicate email violates the unique constraint
    let mut dup = make_account("alice2");
    dup.email = "alice@example.com".to_string();
    assert!(db.insert_account(&dup).await.is_err());
}

#[tokio::test]
async fn test_approve_signup_request_is_guarded_by_pending_state() {
    let (db, _temp_dir) = create_test_db().await;

    let request = make_signup_request("bob");
    db.insert_signup_request(&request).await.unwrap();
    let account = make_account("bob");
    db.insert_account(&account).await.unwrap();

    let approved = db
        .approve_signup_request(&request.id, &account.id, Utc::now())
        .await
        .unwrap();
    assert!(approved);

    // Second approval hits zero rows
    let again = db
        .approve_signup_request(&request.id, &account.id, Utc::now())
        .await
        .unwrap();
    assert!(!again);

    // And rejection of a non-pending request is a no-op too
    assert!(!db.reject_signup_request(&request.id, Utc::now()).await.unwrap());

    let stored = db.get_signup_request(&request.id).await.unwrap().unwrap();
    assert_eq!(stored.state, "approved");
    assert_eq!(stored.invitation_account_id, Some(account.id));
}

#[tokio::test]
async fn test_complete_signup_updates_both_rows_atomically() {
    let (db, _temp_dir) = create_test_db().await;

    let request = make_signup_request("carol");
    db.insert_signup_request(&request).await.unwrap();
    let account = make_account("carol");
    db.insert_account(&account).await.unwrap();
    db.approve_signup_request(&request.id, &account.id, Utc::now())
        .await
        .unwrap();

    let completed = db
        .complete_signup(&request.id, &account.id, Utc::now())
        .await
        .unwrap();
    assert!(completed);

    let stored_request = db.get_signup_request(&request.id).await.unwrap().unwrap();
    let stored_account = db.get_account(&account.id).await.unwrap().unwrap();
    assert_eq!(stored_request.state, "completed");
    assert_eq!(stored_account.status, "active");

    // Replaying the completion leaves everything untouched
    let replay = db
        .complete_signup(&request.id, &account.id, Utc::now())
        .await
        .unwrap();
    assert!(!replay);
}

#[tokio::test]
async fn test_complete_signup_rolls_back_when_account_is_not_invited() {
    let (db, _temp_dir) = create_test_db().await;

    let request = make_signup_request("dave");
    db.insert_signup_request(&request).await.unwrap();
    let mut account = make_account("dave");
    account.status = AccountStatus::Suspended.as_str().to_string();
    db.insert_account(&account).await.unwrap();
    db.approve_signup_request(&request.id, &account.id, Utc::now())
        .await
        .unwrap();

    let completed = db
        .complete_signup(&request.id, &account.id, Utc::now())
        .await
        .unwrap();
    assert!(!completed);

    // The request-side update must have been rolled back
    let stored_request = db.get_signup_request(&request.id).await.unwrap().unwrap();
    assert_eq!(stored_request.state, "approved");
}

#[tokio::test]
async fn test_consume_magic_link_wins_only_once() {
    let (db, _temp_dir) = create_test_db().await;

    let link = make_magic_link(TokenType::Signin, None);
    db.insert_magic_link(&link).await.unwrap();

    assert!(db.consume_magic_link(&link.id, Utc::now()).await.unwrap());
    assert!(!db.consume_magic_link(&link.id, Utc::now()).await.unwrap());

    let stored = db.get_magic_link(&link.id).await.unwrap().unwrap();
    assert!(stored.consumed_at.is_some());
}

#[tokio::test]
async fn test_one_live_signup_token_per_request() {
    let (db, _temp_dir) = create_test_db().await;

    let request = make_signup_request("erin");
    db.insert_signup_request(&request).await.unwrap();

    let first = make_magic_link(TokenType::Signup, Some(&request.id));
    db.insert_magic_link(&first).await.unwrap();

    // A second unconsumed signup token for the same request is rejected
    let second = make_magic_link(TokenType::Signup, Some(&request.id));
    assert!(db.insert_magic_link(&second).await.is_err());

    // Signin tokens are not covered by the partial index
    let signin = make_magic_link(TokenType::Signin, Some(&request.id));
    db.insert_magic_link(&signin).await.unwrap();

    // After consumption a replacement signup token can be issued
    db.consume_magic_link(&first.id, Utc::now()).await.unwrap();
    let replacement = make_magic_link(TokenType::Signup, Some(&request.id));
    db.insert_magic_link(&replacement).await.unwrap();
}

#[tokio::test]
async fn test_insert_following_ignores_duplicate_pair() {
    let (db, _temp_dir) = create_test_db().await;

    let account = make_account("frank");
    db.insert_account(&account).await.unwrap();
    let follower = make_actor(&db, "frank", Some(&account.id)).await;
    let followee = make_actor(&db, "grace", None).await;

    let edge = make_following(&follower, &followee, false);
    let inserted = db.insert_following(&edge).await.unwrap();
    assert!(inserted.is_some());

    // Same pair under a fresh IRI is ignored
    let duplicate = make_following(&follower, &followee, false);
    let ignored = db.insert_following(&duplicate).await.unwrap();
    assert!(ignored.is_none());
}

#[tokio::test]
async fn test_accept_following_is_guarded_by_pending_state() {
    let (db, _temp_dir) = create_test_db().await;

    let account = make_account("heidi");
    db.insert_account(&account).await.unwrap();
    let follower = make_actor(&db, "heidi", Some(&account.id)).await;
    let followee = make_actor(&db, "ivan", None).await;

    let edge = make_following(&follower, &followee, false);
    db.insert_following(&edge).await.unwrap();

    let accepted = db
        .accept_following_by_iri(&edge.iri, Utc::now())
        .await
        .unwrap();
    assert!(accepted.unwrap().accepted.is_some());

    // Re-accepting an already accepted edge affects zero rows
    let again = db
        .accept_following_by_iri(&edge.iri, Utc::now())
        .await
        .unwrap();
    assert!(again.is_none());

    let by_pair = db
        .accept_following_pair(&follower.id, &followee.id, Utc::now())
        .await
        .unwrap();
    assert!(by_pair.is_none());
}

#[tokio::test]
async fn test_counter_policy_recounts_local_and_trusts_deltas_for_remote() {
    let (db, _temp_dir) = create_test_db().await;

    let account = make_account("judy");
    db.insert_account(&account).await.unwrap();
    let local = make_actor(&db, "judy", Some(&account.id)).await;
    let remote = make_actor(&db, "mallory", None).await;

    let edge = make_following(&remote, &local, true);
    db.insert_following(&edge).await.unwrap();

    // Local actor: delta is ignored, the counter is recomputed exactly
    let updated_local = db
        .update_followers_count(&local.id, 5)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated_local.followers_count, 1);

    // Remote actor: we are the only writer, the delta is applied as-is
    let updated_remote = db
        .update_followees_count(&remote.id, 5)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated_remote.followees_count, 5);

    let back_down = db
        .update_followees_count(&remote.id, -2)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(back_down.followees_count, 3);
}

#[tokio::test]
async fn test_delete_following_returns_the_removed_edge() {
    let (db, _temp_dir) = create_test_db().await;

    let account = make_account("kim");
    db.insert_account(&account).await.unwrap();
    let follower = make_actor(&db, "kim", Some(&account.id)).await;
    let followee = make_actor(&db, "leo", None).await;

    let edge = make_following(&follower, &followee, true);
    db.insert_following(&edge).await.unwrap();

    let removed = db
        .delete_following(&follower.id, &followee.id)
        .await
        .unwrap();
    assert_eq!(removed.unwrap().iri, edge.iri);

    let missing = db
        .delete_following(&follower.id, &followee.id)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_upsert_actor_for_account_is_idempotent() {
    let (db, _temp_dir) = create_test_db().await;

    let account = make_account("nina");
    db.insert_account(&account).await.unwrap();

    let first = make_actor(&db, "nina", Some(&account.id)).await;
    assert_eq!(first.handle, "@nina@local.example");

    // Re-syncing refreshes fields without duplicating the row
    let mut resync = first.clone();
    resync.id = EntityId::new().0;
    resync.name = Some("Nina".to_string());
    let second = db.upsert_actor_for_account(&resync).await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.name, Some("Nina".to_string()));

    let looked_up = db
        .get_actor_for_account(&account.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(looked_up.id, first.id);
}

#[tokio::test]
async fn test_insert_post_refreshes_posts_count() {
    let (db, _temp_dir) = create_test_db().await;

    let account = make_account("olga");
    db.insert_account(&account).await.unwrap();
    let actor = make_actor(&db, "olga", Some(&account.id)).await;

    let now = Utc::now();
    let post = Post {
        id: EntityId::new().0,
        actor_id: actor.id.clone(),
        content: "<p>hello fediverse</p>".to_string(),
        iri: format!("{}/posts/1", actor.iri),
        published_at: now,
    };
    db.insert_post(&post).await.unwrap();

    let stored = db.get_actor(&actor.id).await.unwrap().unwrap();
    assert_eq!(stored.posts_count, 1);

    let timeline = db.list_recent_posts(10).await.unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].actor_handle, "@olga@local.example");
}
