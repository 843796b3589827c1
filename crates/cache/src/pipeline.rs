//! Stage memoization on top of a [`CacheStore`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strokelab_common::error::StrokeResult;

use crate::fingerprint::Fingerprint;
use crate::store::{CacheKey, CacheStore};

/// Stored form of one stage output.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEnvelope {
    stage: String,
    key: String,
    /// Fingerprint of the encoded payload.
    checksum: String,
    payload: serde_json::Value,
}

/// Why a stored entry could not be used.
#[derive(Debug)]
enum Rejection {
    Unreadable(String),
    KeyMismatch(String),
    ChecksumMismatch,
    Payload(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Unreadable(e) => write!(f, "unreadable envelope: {e}"),
            Rejection::KeyMismatch(found) => write!(f, "envelope belongs to {found}"),
            Rejection::ChecksumMismatch => write!(f, "checksum mismatch"),
            Rejection::Payload(e) => write!(f, "payload does not decode: {e}"),
        }
    }
}

/// Counters of cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries rejected on read and rewritten.
    pub corrupt: u64,
    /// Writes that lost a race to another writer.
    pub lost_races: u64,
}

/// Memoizes `(input, stage, config) -> output` mappings.
///
/// Store failures are logged and fall back to computing; a cache problem
/// never fails a run.
pub struct PipelineCache {
    store: Arc<dyn CacheStore>,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    corrupt: AtomicU64,
    lost_races: AtomicU64,
}

impl PipelineCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            enabled: true,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            corrupt: AtomicU64::new(0),
            lost_races: AtomicU64::new(0),
        }
    }

    /// A cache that always computes.
    pub fn disabled(store: Arc<dyn CacheStore>) -> Self {
        Self {
            enabled: false,
            ..Self::new(store)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            corrupt: self.corrupt.load(Ordering::Relaxed),
            lost_races: self.lost_races.load(Ordering::Relaxed),
        }
    }

    /// Return the stored output for `(input, stage, config)` or compute,
    /// store and return it.
    pub fn get_or_compute<T, C, F>(
        &self,
        input: Fingerprint,
        stage: &str,
        config: &C,
        compute: F,
    ) -> StrokeResult<T>
    where
        T: Serialize + DeserializeOwned,
        C: Serialize + ?Sized,
        F: FnOnce() -> StrokeResult<T>,
    {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return compute();
        }

        let key = CacheKey::new(input, stage, Fingerprint::of(config)?);
        let mut corrupt = false;

        match self.store.get(&key) {
            Ok(Some(bytes)) => match decode::<T>(&key, &bytes) {
                Ok(value) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(stage, key = %key, "Cache hit");
                    return Ok(value);
                }
                Err(rejection) => {
                    self.corrupt.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(stage, key = %key, reason = %rejection, "Corrupt cache entry, recomputing");
                    corrupt = true;
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(stage, key = %key, error = %e, "Cache read failed, recomputing");
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute()?;

        match encode(&key, &value) {
            Ok(bytes) => {
                let written = if corrupt {
                    self.store.replace(&key, &bytes).map(|()| true)
                } else {
                    self.store.put_if_absent(&key, &bytes)
                };
                match written {
                    Ok(true) => tracing::debug!(stage, key = %key, "Cache entry stored"),
                    Ok(false) => {
                        self.lost_races.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(stage, key = %key, "Cache entry already published");
                    }
                    Err(e) => {
                        tracing::warn!(stage, key = %key, error = %e, "Cache write failed")
                    }
                }
            }
            Err(e) => tracing::warn!(stage, key = %key, error = %e, "Cache encode failed"),
        }

        Ok(value)
    }

    /// Drop every stored entry.
    pub fn clear(&self) -> StrokeResult<usize> {
        let removed = self.store.invalidate_all()?;
        tracing::info!(store = self.store.name(), removed, "Cache cleared");
        Ok(removed)
    }
}

fn encode<T: Serialize>(key: &CacheKey, value: &T) -> StrokeResult<Vec<u8>> {
    let payload = serde_json::to_value(value)?;
    let checksum = Fingerprint::of(&payload)?;
    let envelope = CacheEnvelope {
        stage: key.stage.clone(),
        key: key.to_string(),
        checksum: checksum.to_string(),
        payload,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

fn decode<T: DeserializeOwned>(key: &CacheKey, bytes: &[u8]) -> Result<T, Rejection> {
    let envelope: CacheEnvelope =
        serde_json::from_slice(bytes).map_err(|e| Rejection::Unreadable(e.to_string()))?;

    if envelope.key != key.to_string() || envelope.stage != key.stage {
        return Err(Rejection::KeyMismatch(envelope.key));
    }

    let checksum = Fingerprint::of(&envelope.payload)
        .map_err(|e| Rejection::Payload(e.to_string()))?;
    if Fingerprint::parse(&envelope.checksum) != Some(checksum) {
        return Err(Rejection::ChecksumMismatch);
    }

    serde_json::from_value(envelope.payload).map_err(|e| Rejection::Payload(e.to_string()))
}
