//! SHA-1 digests. This network's wire format is pinned to SHA-1 for
//! header digests, payload hashes, and the decoding-tag derivations; we
//! don't get to pick a different hash without breaking interop.

use duskrelay_core::constants::DIGEST_LEN;
use sha1::{Digest, Sha1};

pub fn sha1(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

pub fn sha1_concat(parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}
