//! Hashing utilities.

use sha2::{Digest, Sha256};

/// 64-bit digest: the first eight bytes of SHA-256, big-endian.
pub fn digest_u64(data: &[u8]) -> u64 {
    let digest = Sha256::digest(data);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Fixed-width `0x`-prefixed rendering of a 64-bit hash.
pub fn hash_hex(hash: u64) -> String {
    format!("{:#018x}", hash)
}
