//! Local key-value cache for data persistence and offline support.
//!
//! This module is diary-agnostic:
//! - A [`KeyValueStore`] trait with get/set/delete/list-by-prefix
//! - A SQLite implementation that survives restarts
//! - Typed [`StorageKey`]s instead of ad-hoc string concatenation

mod keys;
mod storage;
mod traits;

pub use keys::StorageKey;
pub use storage::SqliteStorage;
pub use traits::{CacheResult, CacheSource, KeyValueStore};
