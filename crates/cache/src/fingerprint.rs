//! Deterministic content fingerprints.
//!
//! A fingerprint is the 64-bit FNV-1a hash of a value's `serde_json`
//! encoding. All model maps are `BTreeMap`s, so the encoding (and therefore
//! the fingerprint) is stable across runs and processes.

use std::fmt;

use serde::Serialize;
use strokelab_common::error::StrokeResult;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Content hash of a value, rendered as 16 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// Fingerprint raw bytes.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = FingerprintHasher::new();
        hasher.update(bytes);
        hasher.finish()
    }

    /// Fingerprint the JSON encoding of a value.
    pub fn of<T: Serialize + ?Sized>(value: &T) -> StrokeResult<Self> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self::of_bytes(&bytes))
    }

    /// Parse the 16-hex-digit rendering.
    pub fn parse(hex: &str) -> Option<Self> {
        if hex.len() != 16 {
            return None;
        }
        u64::from_str_radix(hex, 16).ok().map(Self)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Incremental FNV-1a for inputs that arrive in pieces (e.g. streamed frames).
#[derive(Debug, Clone)]
pub struct FingerprintHasher {
    state: u64,
}

impl FingerprintHasher {
    pub fn new() -> Self {
        Self { state: FNV_OFFSET }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.state ^= *byte as u64;
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }

    /// Feed the JSON encoding of a value.
    pub fn update_json<T: Serialize + ?Sized>(&mut self, value: &T) -> StrokeResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.update(&bytes);
        Ok(())
    }

    pub fn finish(&self) -> Fingerprint {
        Fingerprint(self.state)
    }
}

impl Default for FingerprintHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_fnv_vectors() {
        assert_eq!(Fingerprint::of_bytes(b""), Fingerprint(0xcbf29ce484222325));
        assert_eq!(Fingerprint::of_bytes(b"a"), Fingerprint(0xaf63dc4c8601ec8c));
    }

    #[test]
    fn test_display_is_sixteen_hex_digits() {
        let rendered = Fingerprint(0xab).to_string();
        assert_eq!(rendered, "00000000000000ab");
        assert_eq!(Fingerprint::parse(&rendered), Some(Fingerprint(0xab)));
        assert_eq!(Fingerprint::parse("ab"), None);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut hasher = FingerprintHasher::new();
        hasher.update(b"stroke");
        hasher.update(b"lab");
        assert_eq!(hasher.finish(), Fingerprint::of_bytes(b"strokelab"));
    }

    #[test]
    fn test_value_fingerprint_depends_on_content() {
        let a = Fingerprint::of(&vec![1.0, 2.0]).unwrap();
        let b = Fingerprint::of(&vec![1.0, 2.0]).unwrap();
        let c = Fingerprint::of(&vec![1.0, 2.5]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
