//! RSA-OAEP with SHA-1, matching the wire protocol's packet-key
//! cryptosystem. One quirk this network relies on: an OAEP ciphertext
//! is rejected and re-encrypted if its leading byte has the high bit
//! set, so that an RSA modulus one bit narrower than a full byte
//! boundary can't be fingerprinted by an observer checking whether
//! ciphertexts ever exceed the modulus's nominal bit length.

use rand_core::CryptoRngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;

use crate::error::{CryptoError, Result};

pub fn generate_keypair<R: CryptoRngCore>(rng: &mut R, bits: usize) -> Result<RsaPrivateKey> {
    Ok(RsaPrivateKey::new(rng, bits)?)
}

/// Encrypt `plaintext` under `key`, retrying with fresh randomness
/// until the ciphertext's leading byte has its high bit clear.
pub fn encrypt<R: CryptoRngCore>(
    rng: &mut R,
    key: &RsaPublicKey,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    loop {
        let padding = Oaep::new::<Sha1>();
        let ct = key.encrypt(rng, padding, plaintext)?;
        if ct.first().map(|b| b & 0x80 == 0).unwrap_or(false) {
            return Ok(ct);
        }
    }
}

pub fn decrypt(key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let padding = Oaep::new::<Sha1>();
    Ok(key.decrypt(padding, ciphertext)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn round_trip() {
        let mut rng = OsRng;
        let sk = generate_keypair(&mut rng, 2048).unwrap();
        let pk = RsaPublicKey::from(&sk);
        let msg = b"a subheader's worth of plaintext";
        let ct = encrypt(&mut rng, &pk, msg).unwrap();
        assert_eq!(ct[0] & 0x80, 0);
        let pt = decrypt(&sk, &ct).unwrap();
        assert_eq!(pt, msg);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let mut rng = OsRng;
        let sk1 = generate_keypair(&mut rng, 2048).unwrap();
        let sk2 = generate_keypair(&mut rng, 2048).unwrap();
        let pk1 = RsaPublicKey::from(&sk1);
        let ct = encrypt(&mut rng, &pk1, b"secret").unwrap();
        assert!(decrypt(&sk2, &ct).is_err());
    }
}
