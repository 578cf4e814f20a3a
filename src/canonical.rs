//! Canonical serialization for deterministic hashing.
//!
//! Used to fingerprint model snapshots and parameter sets, so a run can be
//! identified by (params hash, seed, duple history) and a persisted model can
//! be checked after loading.
//!
//! ## Determinism Guarantees
//!
//! - Struct fields serialize in declaration order
//! - Vectors serialize in index order; callers sort records before hashing
//! - Maps in hashed data are `BTreeMap`, never `HashMap`
//! - Segments serialize as ascending constant sequences
//! - Floats are quantized by the caller before hashing

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes.
///
/// Panics only if `value`'s `Serialize` impl fails, which the crate's types
/// never do.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// xxh64 of the canonical bytes of a value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Canonical hash as a 16-digit hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}
