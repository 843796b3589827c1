//! StrokeLab Pipeline Cache
//!
//! Content-addressed memoization for analysis stages. Entries are keyed by
//! `(input fingerprint, stage name, config fingerprint)` and published
//! atomically; a corrupt entry reads as a miss and is rewritten.

pub mod fingerprint;
pub mod pipeline;
pub mod store;

pub use fingerprint::{Fingerprint, FingerprintHasher};
pub use pipeline::{CacheStats, PipelineCache};
pub use store::{CacheKey, CacheStore, FsCacheStore, MemoryCacheStore};
