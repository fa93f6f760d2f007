//! Hashing System - SHA-256 for Cache Keys
//!
//! Same template + same compile options => same key, independent of map
//! ordering in the options.

use std::fmt::Write;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    to_hex(&Sha256::digest(data))
}

/// JSON with object keys in byte order at every level and no whitespace.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(value)?;
    canonicalize(&mut value);
    serde_json::to_string(&value)
}

fn canonicalize(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = std::mem::take(map).into_iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            for (key, mut inner) in entries {
                canonicalize(&mut inner);
                map.insert(key, inner);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(canonicalize),
        _ => {}
    }
}

/// sha256(sha256(source) ":" canonical(options))
pub fn compute_compile_key(source: &str, options: &impl Serialize) -> Result<String, serde_json::Error> {
    let digest = Sha256::new()
        .chain_update(sha256_hex(source))
        .chain_update(b":")
        .chain_update(canonical_json(options)?)
        .finalize();
    Ok(to_hex(&digest))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}
