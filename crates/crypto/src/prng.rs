//! A deterministic, seekable pseudo-random stream keyed by a 16-byte
//! AES key, used wherever the wire protocol needs reproducible
//! "randomness": junk precomputation, header padding, and the
//! secret-generation chain behind a reply block.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};

use duskrelay_core::types::Prng;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

pub struct AesCounterPrng {
    cipher: Aes128Ctr,
}

impl AesCounterPrng {
    pub fn new(key: [u8; 16]) -> Self {
        let iv = [0u8; 16];
        AesCounterPrng { cipher: Aes128Ctr::new(&key.into(), &iv.into()) }
    }
}

impl Prng for AesCounterPrng {
    fn fill_bytes(&mut self, buf: &mut [u8]) {
        buf.iter_mut().for_each(|b| *b = 0);
        self.cipher.apply_keystream(buf);
    }
}

/// Apply the same AES-CTR keystream (zero IV) used for the PRNG as a
/// symmetric cipher over arbitrary data: this is how junk chains and
/// header padding are "encrypted" in place rather than merely sampled.
pub fn ctr_crypt(key: [u8; 16], data: &mut [u8]) {
    let iv = [0u8; 16];
    let mut cipher = Aes128Ctr::new(&key.into(), &iv.into());
    cipher.apply_keystream(data);
}

/// Like [`ctr_crypt`], but starts the keystream at `offset` bytes into
/// the stream instead of at the beginning. Junk precomputation needs
/// this: each hop's junk is encrypted as a continuation of whatever
/// keystream position that hop's own header content ends at, not from
/// a fresh offset 0, so that a later hop decrypting the whole buffer
/// in one pass lands on the same bytes.
pub fn ctr_crypt_at(key: [u8; 16], data: &mut [u8], offset: usize) {
    let iv = [0u8; 16];
    let mut cipher = Aes128Ctr::new(&key.into(), &iv.into());
    cipher.seek(offset as u64);
    cipher.apply_keystream(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_produces_same_stream() {
        let mut a = AesCounterPrng::new([1u8; 16]);
        let mut b = AesCounterPrng::new([1u8; 16]);
        assert_eq!(a.bytes(64), b.bytes(64));
    }

    #[test]
    fn different_keys_diverge() {
        let mut a = AesCounterPrng::new([1u8; 16]);
        let mut b = AesCounterPrng::new([2u8; 16]);
        assert_ne!(a.bytes(32), b.bytes(32));
    }

    #[test]
    fn ctr_crypt_is_its_own_inverse() {
        let key = [9u8; 16];
        let mut data = b"round trip me please!!".to_vec();
        let original = data.clone();
        ctr_crypt(key, &mut data);
        assert_ne!(data, original);
        ctr_crypt(key, &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn ctr_crypt_at_continues_the_same_stream() {
        let key = [4u8; 16];
        let mut whole = vec![0u8; 40];
        ctr_crypt(key, &mut whole);

        let mut tail = vec![0u8; 10];
        ctr_crypt_at(key, &mut tail, 30);
        assert_eq!(tail, whole[30..]);
    }
}
