//! ActivityPub federation module
//!
//! Handles:
//! - Actor synchronization and follow relationships
//! - Inbound activity processing (Follow, Accept, Undo)
//! - Outbound activity delivery with HTTP Signatures
//! - Federation context (URI derivation, delivery client)

mod context;
mod delivery;
mod inbox;
mod relationship;
mod signature;

pub use context::{FederationContext, SOFTWARE_NAME, SOFTWARE_VERSION};
pub use delivery::{ActivityDelivery, builder, recipient_inbox};
pub use inbox::{ActivityProcessor, ActivityType};
pub use relationship::RelationshipEngine;
pub use signature::{SignatureHeaders, generate_private_key_pem, sign_request};

#[cfg(test)]
pub(crate) use relationship::test_support;
