//! Federation context
//!
//! Derives the federation URIs for local accounts and owns the outbound
//! delivery client. The context is constructed once at startup and
//! passed explicitly into engine operations; there is no process-wide
//! federation singleton.

use std::sync::Arc;

use super::ActivityDelivery;

/// Software name reported in instance rows
pub const SOFTWARE_NAME: &str = "skiff";
/// Software version reported in instance rows
pub const SOFTWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Explicitly constructed federation context
#[derive(Clone)]
pub struct FederationContext {
    /// Base URL of this instance, no trailing slash
    origin: String,
    /// Serving host (domain)
    host: String,
    /// Outbound delivery client
    delivery: Arc<ActivityDelivery>,
}

impl FederationContext {
    /// Create a new context for the given origin
    ///
    /// # Arguments
    /// * `origin` - Base URL like "https://social.example.com"
    /// * `host` - Serving domain like "social.example.com"
    /// * `delivery` - Signed delivery client
    pub fn new(origin: String, host: String, delivery: Arc<ActivityDelivery>) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            host,
            delivery,
        }
    }

    /// Base URL of this instance
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Serving host of this instance
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Outbound delivery client
    pub fn delivery(&self) -> &ActivityDelivery {
        &self.delivery
    }

    /// ActivityPub actor URI for a local username
    pub fn actor_uri(&self, username: &str) -> String {
        format!("{}/ap/actors/{}", self.origin, username)
    }

    /// Personal inbox URI for a local username
    pub fn inbox_uri(&self, username: &str) -> String {
        format!("{}/ap/actors/{}/inbox", self.origin, username)
    }

    /// Shared inbox URI of this instance
    pub fn shared_inbox_uri(&self) -> String {
        format!("{}/ap/inbox", self.origin)
    }

    /// Followers collection URI for a local username
    pub fn followers_uri(&self, username: &str) -> String {
        format!("{}/ap/actors/{}/followers", self.origin, username)
    }

    /// Human-facing profile URL for a local username
    pub fn profile_url(&self, username: &str) -> String {
        format!("{}/@{}", self.origin, username)
    }
}
