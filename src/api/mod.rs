//! API layer
//!
//! HTTP handlers for:
//! - Signup/signin magic links
//! - Posts and the public timeline
//! - ActivityPub (for federation)
//! - Admin signup moderation
//! - Metrics (Prometheus)

mod activitypub;
mod admin;
mod auth;
pub mod metrics;
mod posts;
mod wellknown;

pub use activitypub::activitypub_router;
pub use admin::admin_router;
pub use auth::auth_router;
pub use metrics::metrics_router;
pub use posts::posts_router;
pub use wellknown::wellknown_router;
