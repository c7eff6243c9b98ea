// ── Resource cache ──
//
// Last-known value per subscription key, with push-based change
// notification and optimistic overrides.

mod cache;
mod entry;

pub use cache::{ApplyOutcome, ResourceCache};
pub use entry::{CacheEntry, Health};
