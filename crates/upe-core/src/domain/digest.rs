//! Canonical JSON encoding and content digests.
//!
//! Provenance records are compared by digest, so their encoding must not
//! depend on map insertion order or on whether `serde_json` was built with
//! `preserve_order`. Object keys are sorted recursively; arrays keep order.

use serde::Serialize;
use upe_state::ContentDigest;

use crate::domain::error::Result;

fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<(&String, &serde_json::Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = serde_json::Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), sort_keys(v));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sort_keys).collect())
        }
        other => other.clone(),
    }
}

/// Compact JSON with recursively sorted object keys.
pub fn canonical_json(value: &serde_json::Value) -> Result<String> {
    Ok(serde_json::to_string(&sort_keys(value))?)
}

/// SHA-256 of the canonical JSON encoding of any serializable value.
pub fn digest_of<T: Serialize>(value: &T) -> Result<ContentDigest> {
    let json = serde_json::to_value(value)?;
    let canonical = canonical_json(&json)?;
    Ok(ContentDigest::from_bytes(canonical.as_bytes()))
}

/// SHA-256 hex of UTF-8 text (used for retrieval source bodies).
pub fn text_digest(text: &str) -> ContentDigest {
    ContentDigest::from_bytes(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_is_key_order_invariant() {
        let a = serde_json::json!({ "b": 1, "a": { "z": true, "y": [3, 1] } });
        let b = serde_json::json!({ "a": { "y": [3, 1], "z": true }, "b": 1 });
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
        assert_eq!(
            canonical_json(&a).unwrap(),
            r#"{"a":{"y":[3,1],"z":true},"b":1}"#
        );
    }

    #[test]
    fn array_order_matters() {
        let a = serde_json::json!([1, 2]);
        let b = serde_json::json!([2, 1]);
        assert_ne!(digest_of(&a).unwrap(), digest_of(&b).unwrap());
    }

    #[test]
    fn text_digest_matches_sha256() {
        assert_eq!(
            text_digest("").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
