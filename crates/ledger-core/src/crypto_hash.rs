//! Order-independent SHA-256 over a list of heterogeneous inputs.
//!
//! Every input is rendered to a canonical string, the strings are sorted and
//! joined with a single space, and the result is digested. Permuting the
//! inputs therefore never changes the digest.

use crate::Payload;
use sha2::{Digest, Sha256};
use std::borrow::Cow;

/// A value that can take part in [`crypto_hash`].
pub trait HashInput {
    fn canonical(&self) -> Cow<'_, str>;
}

impl HashInput for str {
    fn canonical(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl HashInput for String {
    fn canonical(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl HashInput for u64 {
    fn canonical(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }
}

impl HashInput for u32 {
    fn canonical(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }
}

impl HashInput for i64 {
    fn canonical(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }
}

/// Payloads render as compact JSON with object keys sorted at every depth.
impl HashInput for Payload {
    fn canonical(&self) -> Cow<'_, str> {
        let mut out = String::new();
        write_canonical_json(self, &mut out);
        Cow::Owned(out)
    }
}

/// Sorts keys itself so the rendering does not depend on whether
/// `serde_json` was built with `preserve_order`.
fn write_canonical_json(value: &Payload, out: &mut String) {
    match value {
        Payload::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical_json(item, out);
            }
            out.push(']');
        }
        Payload::Object(map) => {
            let mut entries: Vec<(&String, &Payload)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Display of a JSON string value gives the quoted, escaped key.
                out.push_str(&Payload::String(key.clone()).to_string());
                out.push(':');
                write_canonical_json(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

impl<T: HashInput + ?Sized> HashInput for &T {
    fn canonical(&self) -> Cow<'_, str> {
        (**self).canonical()
    }
}

/// SHA-256 of the sorted canonical inputs, as lowercase hex.
pub fn crypto_hash(inputs: &[&dyn HashInput]) -> String {
    let mut parts: Vec<Cow<'_, str>> = inputs.iter().map(|input| input.canonical()).collect();
    parts.sort_unstable();

    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b" ");
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HASH_HEX_SIZE;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn sha256_regression_pin() {
        assert_eq!(
            crypto_hash(&[&"edbob"]),
            "874de9a9f3f5414e49791e4bdf8452eedaae7d83c4d5fc6809379b1f27fd0e3f"
        );
    }

    #[test]
    fn same_inputs_any_order() {
        assert_eq!(
            crypto_hash(&[&"one", &"two", &"three"]),
            crypto_hash(&[&"three", &"two", &"one"])
        );
    }

    #[test]
    fn mixed_inputs_any_order() {
        let data = json!({"to": "bob", "from": "ed"});
        let a = crypto_hash(&[&42u64, &"last", &data, &7u32]);
        let b = crypto_hash(&[&7u32, &data, &42u64, &"last"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_HEX_SIZE);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn payload_key_order_is_irrelevant() {
        let a: Payload = serde_json::from_str(r#"{"a":1,"b":[1,2]}"#).unwrap();
        let b: Payload = serde_json::from_str(r#"{"b":[1,2],"a":1}"#).unwrap();
        assert_eq!(crypto_hash(&[&a]), crypto_hash(&[&b]));
    }

    #[test]
    fn payload_renders_sorted_compact_json() {
        let mut inner = serde_json::Map::new();
        inner.insert("z".into(), json!(null));
        inner.insert("a".into(), json!("q\"uote"));
        let mut outer = serde_json::Map::new();
        outer.insert("list".into(), json!([3, 1.5, true]));
        outer.insert("inner".into(), Payload::Object(inner));

        let rendered = Payload::Object(outer).canonical().into_owned();
        assert_eq!(
            rendered,
            r#"{"inner":{"a":"q\"uote","z":null},"list":[3,1.5,true]}"#
        );
    }

    #[test]
    fn different_inputs_differ() {
        assert_ne!(crypto_hash(&[&"edbob"]), crypto_hash(&[&"bobed"]));
        assert_ne!(crypto_hash(&[&1u64]), crypto_hash(&[&2u64]));
    }

    proptest! {
        #[test]
        fn prop_hash_is_permutation_invariant(
            inputs in proptest::collection::vec(".{0,12}", 0..8),
            seed in any::<u64>(),
        ) {
            let mut shuffled = inputs.clone();
            // Deterministic rotation + reversal driven by the seed.
            if !shuffled.is_empty() {
                let k = (seed as usize) % shuffled.len();
                shuffled.rotate_left(k);
                if seed % 2 == 0 {
                    shuffled.reverse();
                }
            }
            let original: Vec<&dyn HashInput> = inputs.iter().map(|s| s as &dyn HashInput).collect();
            let permuted: Vec<&dyn HashInput> = shuffled.iter().map(|s| s as &dyn HashInput).collect();
            prop_assert_eq!(crypto_hash(&original), crypto_hash(&permuted));
        }
    }
}
