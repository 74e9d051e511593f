//! Canonical content hashing for conversation identity/dedup (spec §4.2).

use sha2::{Digest, Sha256};

/// SHA-256 over a value's canonical form. `serde_json::Value`'s `Object`
/// variant is a `BTreeMap` by default, so serializing it already yields
/// sorted keys with no insignificant whitespace.
pub fn canonical_sha256(value: &serde_json::Value) -> String {
    let canonical = serde_json::to_vec(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_hash_ignores_key_order_and_whitespace() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{ "a" : 2 , "b" : 1 }"#).unwrap();
        assert_eq!(canonical_sha256(&a), canonical_sha256(&b));
    }
}
