use sha2::{Digest, Sha256};

/// SHA-256 of `data`, returned as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(digest)
}
