//! Response cache for idempotent reads
//!
//! This module provides the process-wide store that captured responses live
//! in, together with the textual key derivation used to address them. Entries
//! expire lazily when read past their lifetime and can be invalidated in bulk
//! by group and action tags or individually by id.

mod key;
mod store;

pub use key::{derive_key, key_for, KEY_SEPARATOR};
pub use store::{CacheEntry, CacheStatsSnapshot, CacheStore, Envelope};
