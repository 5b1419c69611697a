//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Accounts
// =============================================================================

/// A local user identity
///
/// Created in `invited` status when a signup request is approved;
/// becomes `active` only through signup-token consumption.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Short self-description shown on the profile
    pub intro: Option<String>,
    /// Status: invited, active, suspended, deleted
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Invited,
    Active,
    Suspended,
    Deleted,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invited => "invited",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Deleted => "deleted",
        }
    }
}

impl Account {
    /// Only active accounts may authenticate or post.
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active.as_str()
    }
}

// =============================================================================
// Signup requests
// =============================================================================

/// A pending application for an account
///
/// State moves strictly pending -> approved -> completed, or
/// pending -> rejected. `invitation_account_id` is set at approval.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SignupRequest {
    pub id: String,
    pub username: String,
    pub email: String,
    pub intro: Option<String>,
    /// State: pending, approved, rejected, completed
    pub state: String,
    /// Account created at approval time
    pub invitation_account_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Signup request states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupState {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl SignupState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }
}

// =============================================================================
// Magic links
// =============================================================================

/// A single-use bearer credential for signup or signin
///
/// Only a salted hash of the token is ever stored. A link is valid iff
/// `consumed_at IS NULL AND expires_at > now`; consumption is a one-way
/// transition set by a conditional update.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MagicLink {
    pub id: String,
    pub account_id: Option<String>,
    pub request_id: Option<String>,
    /// Salted one-way hash, format "{base64(salt)}.{base64(mac)}"
    pub token_hash: String,
    /// Type: signup or signin
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Magic link token types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Signup,
    Signin,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::Signin => "signin",
        }
    }
}

// =============================================================================
// Federation: instances and actors
// =============================================================================

/// A federation peer host (the local host has a row too)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Instance {
    pub host: String,
    pub software: Option<String>,
    pub software_version: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Federation-facing identity, local or remote
///
/// `account_id` is set for local actors only; a null `account_id` marks
/// a remote actor we track passively. `handle` is derived in the schema
/// from username and handle_host.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Actor {
    pub id: String,
    /// Globally unique federation identifier
    pub iri: String,
    /// Type: Person, Application, Group, Organization, Service
    pub actor_type: String,
    pub username: String,
    pub instance_host: String,
    pub handle_host: String,
    /// Derived "@username@host", generated column
    pub handle: String,
    pub preferred_username: String,
    pub account_id: Option<String>,
    pub name: Option<String>,
    pub automatically_approves_followers: bool,
    pub inbox_url: String,
    pub shared_inbox_url: Option<String>,
    pub followers_url: Option<String>,
    pub url: Option<String>,
    pub followees_count: i64,
    pub followers_count: i64,
    pub posts_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// ActivityPub actor types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    Application,
    Group,
    Organization,
    Person,
    Service,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "Application",
            Self::Group => "Group",
            Self::Organization => "Organization",
            Self::Person => "Person",
            Self::Service => "Service",
        }
    }
}

impl Actor {
    /// A local actor is one backed by a local account.
    pub fn is_local(&self) -> bool {
        self.account_id.is_some()
    }
}

// =============================================================================
// Followings
// =============================================================================

/// A directed follow edge between two actors
///
/// Keyed by the IRI of the Follow activity that created it.
/// `accepted IS NULL` marks a pending follow request.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Following {
    pub iri: String,
    pub follower_id: String,
    pub followee_id: String,
    pub accepted: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
}

impl Following {
    pub fn is_pending(&self) -> bool {
        self.accepted.is_none()
    }
}

// =============================================================================
// Posts
// =============================================================================

/// A timeline post by a local actor
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    pub actor_id: String,
    /// Sanitized HTML content
    pub content: String,
    /// ActivityPub object IRI
    pub iri: String,
    pub published_at: DateTime<Utc>,
}

/// A timeline row: post joined with its author
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TimelineEntry {
    pub id: String,
    pub content: String,
    pub iri: String,
    pub published_at: DateTime<Utc>,
    pub actor_id: String,
    pub actor_handle: String,
    pub actor_name: Option<String>,
}
