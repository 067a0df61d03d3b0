//! Stable cache-key derivation (spec §3 "Cache entry", §4.4).

use sha2::{Digest, Sha256};

use crate::normalize::normalize;

/// A stable 128-bit-class digest over `(operation, canonicalized args)`, hex-encoded.
/// Every arg is run through `normalize` so `"Stereolab"` and `"  stereolab "` key
/// the same cache entry.
pub fn derive_key(operation: &str, args: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    for arg in args {
        hasher.update(b"\0");
        hasher.update(normalize(arg).as_bytes());
    }
    let digest = hasher.finalize();
    // First 16 bytes (128 bits) is plenty of keyspace for this use and keeps keys short.
    hex_encode(&digest[..16])
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_operation_and_args_hash_identically() {
        let a = derive_key("search_release", &["Stereolab", "Percolator"]);
        let b = derive_key("search_release", &["  Stereolab ", "PERCOLATOR"]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_operations_hash_differently() {
        let a = derive_key("search_release", &["Stereolab"]);
        let b = derive_key("get_release", &["Stereolab"]);
        assert_ne!(a, b);
    }

    #[test]
    fn different_args_hash_differently() {
        let a = derive_key("search_release", &["Stereolab", "Percolator"]);
        let b = derive_key("search_release", &["Stereolab", "Lo Fi"]);
        assert_ne!(a, b);
    }
}
