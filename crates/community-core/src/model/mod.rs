// ── Domain model ──
//
// Subscription identity plus the payloads each resource kind carries.

pub mod key;
pub mod resources;

pub use key::{EntityId, ResourceKind, SubscriptionKey};
pub use resources::{Employee, ImageBlob, Payload, Proposal, Review, ServiceDetail};
