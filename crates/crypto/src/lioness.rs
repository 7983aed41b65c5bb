//! LIONESS: the large-block (unbalanced Feistel) cipher used to whiten
//! headers and payloads so that every byte of a LIONESS-encrypted block
//! depends on every other byte, without the cost of block-encrypting
//! the whole thing under a conventional cipher. Follows the
//! Anderson/Biham LION/BEAR construction: the block splits into a
//! short left half `L` (one hash output wide) and a long right half
//! `R`; two hash rounds and two stream-cipher rounds alternate, each
//! keyed off the current state of the other half.

use duskrelay_core::constants::DIGEST_LEN;

use crate::digest::sha1_concat;
use crate::keyset::LionessKeys;
use crate::prng::ctr_crypt;

/// Derive a 16-byte AES-CTR key for one stream-cipher round from a
/// round key and the current left half.
fn round_stream_key(k: &[u8; DIGEST_LEN], l: &[u8; DIGEST_LEN]) -> [u8; 16] {
    let digest = sha1_concat(&[k, l]);
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    key
}

fn hash_round(k: &[u8; DIGEST_LEN], r: &[u8]) -> [u8; DIGEST_LEN] {
    sha1_concat(&[k, r])
}

fn stream_round(k: &[u8; DIGEST_LEN], l: &[u8; DIGEST_LEN], r: &mut [u8]) {
    ctr_crypt(round_stream_key(k, l), r);
}

fn xor_into(dst: &mut [u8; DIGEST_LEN], src: &[u8; DIGEST_LEN]) {
    for i in 0..DIGEST_LEN {
        dst[i] ^= src[i];
    }
}

/// Encrypt `block` in place. `block` must be longer than `DIGEST_LEN`;
/// the first `DIGEST_LEN` bytes are the left half, the rest the right.
pub fn encrypt(keys: &LionessKeys, block: &mut [u8]) {
    assert!(block.len() > DIGEST_LEN, "LIONESS block must exceed one hash width");
    let (l, r) = block.split_at_mut(DIGEST_LEN);
    let mut left: [u8; DIGEST_LEN] = l.try_into().unwrap();

    stream_round(&keys.k1, &left, r);
    xor_into(&mut left, &hash_round(&keys.k2, r));
    stream_round(&keys.k3, &left, r);
    xor_into(&mut left, &hash_round(&keys.k4, r));

    l.copy_from_slice(&left);
}

/// Decrypt `block` in place: the exact inverse of [`encrypt`].
pub fn decrypt(keys: &LionessKeys, block: &mut [u8]) {
    assert!(block.len() > DIGEST_LEN, "LIONESS block must exceed one hash width");
    let (l, r) = block.split_at_mut(DIGEST_LEN);
    let mut left: [u8; DIGEST_LEN] = l.try_into().unwrap();

    xor_into(&mut left, &hash_round(&keys.k4, r));
    stream_round(&keys.k3, &left, r);
    xor_into(&mut left, &hash_round(&keys.k2, r));
    stream_round(&keys.k1, &left, r);

    l.copy_from_slice(&left);
}
