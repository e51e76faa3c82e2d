//! Content hashing for change detection.
//!
//! Documents are canonicalized before digesting: object keys are sorted at every
//! depth, array order is kept, scalars use serde_json's compact encoding. The
//! result does not depend on key insertion order or on how the store (e.g. JSONB)
//! reorders keys on the way back out.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 over the canonical form, lowercase hex (64 chars).
pub fn content_hash(content: &Value) -> String {
    let canonical = canonicalize(content);
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

/// Compact JSON text with recursively sorted object keys.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_stable_under_top_level_key_reordering() {
        let a: Value = serde_json::from_str(r#"{"skills":["a","b"],"summary":"x"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"summary":"x","skills":["a","b"]}"#).unwrap();
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_hash_stable_under_nested_key_reordering() {
        let a: Value = serde_json::from_str(
            r#"{"experience":[{"company":"Acme","role":"SRE","meta":{"x":1,"y":2}}]}"#,
        )
        .unwrap();
        let b: Value = serde_json::from_str(
            r#"{"experience":[{"meta":{"y":2,"x":1},"role":"SRE","company":"Acme"}]}"#,
        )
        .unwrap();
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_hash_sensitive_to_value_change() {
        assert_ne!(
            content_hash(&json!({"summary": "x"})),
            content_hash(&json!({"summary": "y"}))
        );
    }

    #[test]
    fn test_hash_sensitive_to_array_order() {
        assert_ne!(
            content_hash(&json!({"skills": ["a", "b"]})),
            content_hash(&json!({"skills": ["b", "a"]}))
        );
    }

    #[test]
    fn test_hash_is_64_hex_chars() {
        let hash = content_hash(&json!({}));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_canonical_form_sorts_and_escapes_keys() {
        let value = json!({"b": 1, "a\"q": [true, null, {"d": "e", "c": 1.5}]});
        assert_eq!(
            canonicalize(&value),
            r#"{"a\"q":[true,null,{"c":1.5,"d":"e"}],"b":1}"#
        );
    }
}
