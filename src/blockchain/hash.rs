use sha2::{Digest, Sha256};

/// Previous hash of the genesis block: 64 zero characters, the length of a
/// hex encoded SHA-256 digest.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Computes the SHA-256 digest of the given bytes
pub fn digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes the SHA-256 digest of the given bytes as a lowercase hexadecimal string
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(digest(data))
}

/// Checks whether a hex digest starts with `difficulty` zero characters
///
/// A digest shorter than the difficulty never qualifies.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}
