//! Offline-first diary state.
//!
//! - Entry store: in-memory entries, newest first
//! - Review cache partitioned by UI language, with a legacy fallback tier
//! - Audio cache and the persisted offline queue
//! - [`OfflineSyncCache`]: saves, loads, deletes and drains the queue

mod audio_cache;
mod engine;
mod entry_store;
mod offline_queue;
mod review_cache;

pub use engine::{LanguageSwitchReport, OfflineSyncCache, SaveOutcome, SyncReport};
pub use review_cache::{CachedReview, ReviewTier};
