//! REST client with a request-level response cache
//!
//! Idempotent reads are captured in a process-wide [`cache::CacheStore`] and
//! served from it until they expire or are invalidated. Writes always go to
//! the network and leave invalidation to the caller.

pub mod cache;
pub mod cli;
pub mod config;
pub mod http;

pub use cache::{CacheStore, Envelope};
pub use config::ClientConfig;
pub use http::{ApiClient, Classification, Dispatcher, RequestDescriptor};
