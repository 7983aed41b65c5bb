//! Decoding a payload once it has reached the end of its path: parsing
//! a plain Singleton/Fragment payload, trying outstanding reply shared
//! keys against a payload that might be a reply, and recovering an
//! encrypted-forward payload's plaintext.

use duskrelay_core::constants::{DIGEST_LEN, MAX_REPLY_SECRETS, PAYLOAD_LEN, SECRET_LEN, TAG_LEN};
use duskrelay_core::{codec, Payload};
use duskrelay_crypto::keyset::{END_TO_END_ENCRYPT_MODE, PAYLOAD_ENCRYPT_MODE};
use duskrelay_crypto::{lioness, rsa_oaep, AesCounterPrng, Keyset};
use rsa::RsaPrivateKey;

use crate::error::{OnionError, Result};
use crate::surb::{generate_key, validate_hash};

/// Parse a payload that is already known to need no further
/// whitening: a Singleton or Fragment delivered straight to an exit.
pub fn decode_forward(payload: &[u8; PAYLOAD_LEN]) -> Result<Payload> {
    Ok(codec::parse_payload(payload)?)
}

/// The full payload-decoder dispatch: try the payload as a plain
/// forward delivery, then as a reply keyed to one of `user_keys`, then
/// (if `rsa_key` is given) as an encrypted-forward delivery. `tag` and
/// `exit_data` are the exit routing info's decoding tag and trailing
/// bytes (see [`duskrelay_core::RoutingInfo::exit_tag`] and
/// `exit_data`) — `exit_data` is only consulted for the encrypted-
/// forward attempt. `ret_nym` collects the name of whichever user
/// key's reply this turned out to be, if any. Returns `None`, never an
/// error, when nothing matches — the caller may still have other keys
/// worth trying.
pub fn decode_payload(
    payload: &[u8; PAYLOAD_LEN],
    tag: Option<[u8; TAG_LEN]>,
    exit_data: &[u8],
    rsa_key: Option<&RsaPrivateKey>,
    user_keys: &[(String, Vec<u8>)],
    ret_nym: &mut Vec<String>,
) -> Result<Option<Payload>> {
    if codec::check_payload(payload) {
        return Ok(Some(codec::parse_payload(payload)?));
    }

    let Some(tag) = tag else {
        return Ok(None);
    };

    for (name, user_key) in user_keys {
        if validate_hash(&tag, user_key)[DIGEST_LEN - 1] != 0 {
            continue;
        }
        let recovered = decode_surb(&tag, user_key, payload)?;
        ret_nym.push(name.clone());
        return Ok(Some(codec::parse_payload(&recovered)?));
    }

    if let Some(rsa_key) = rsa_key {
        let mut candidate = *payload;
        match decode_encrypted_forward(rsa_key, tag, exit_data, &mut candidate) {
            Ok(()) => {
                if codec::check_payload(&candidate) {
                    return Ok(Some(codec::parse_payload(&candidate)?));
                }
                return Err(OnionError::CorruptPayload);
            }
            Err(OnionError::Crypto(_)) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(None)
}

/// §4.3.1: re-derive the 17-candidate secret chain from `(tag,
/// user_key)` and LIONESS-*encrypt* the payload under each in turn
/// until `check_payload` holds. The canary in [`decode_payload`] makes
/// a false positive here a 1-in-256 event, so exhausting all
/// candidates without a match is treated as corruption rather than a
/// quiet miss.
fn decode_surb(tag: &[u8; TAG_LEN], user_key: &[u8], payload: &[u8; PAYLOAD_LEN]) -> Result<[u8; PAYLOAD_LEN]> {
    let mut secrets = AesCounterPrng::new(generate_key(tag, user_key));
    let mut candidate = *payload;
    for _ in 0..MAX_REPLY_SECRETS {
        let mut secret = [0u8; SECRET_LEN];
        secret.copy_from_slice(&secrets.bytes(SECRET_LEN));
        let keys = Keyset::new(secret).lioness_keys(PAYLOAD_ENCRYPT_MODE);
        lioness::encrypt(&keys, &mut candidate);
        if codec::check_payload(&candidate) {
            return Ok(candidate);
        }
    }
    Err(OnionError::CorruptPayload)
}

/// Try each candidate shared key (as handed out alongside outstanding
/// reply blocks) against `payload`, undoing the single LIONESS
/// whitening pass [`crate::message::build_reply`] applies, until one
/// validates. Stops after `MAX_REPLY_SECRETS` candidates even if more
/// are given, matching the limit on outstanding reply contexts a node
/// is expected to track at once.
pub fn try_decode_reply(
    payload: &[u8; PAYLOAD_LEN],
    candidate_keys: &[[u8; SECRET_LEN]],
) -> Option<(usize, [u8; PAYLOAD_LEN])> {
    for (i, key) in candidate_keys.iter().enumerate().take(MAX_REPLY_SECRETS) {
        let mut candidate = *payload;
        let keys = Keyset::new(*key).lioness_keys(PAYLOAD_ENCRYPT_MODE);
        lioness::decrypt(&keys, &mut candidate);
        if codec::check_payload(&candidate) {
            return Some((i, candidate));
        }
    }
    None
}

/// Recover an encrypted-forward packet's plaintext payload, given the
/// exit routing info's decoding tag and trailing bytes (together the
/// RSA-OAEP ciphertext of the session key) and the recipient's private
/// key. Decrypts `payload` in place.
pub fn decode_encrypted_forward(
    recipient_key: &RsaPrivateKey,
    tag: [u8; TAG_LEN],
    exit_data: &[u8],
    payload: &mut [u8; PAYLOAD_LEN],
) -> Result<()> {
    let mut rsa_ct = Vec::with_capacity(TAG_LEN + exit_data.len());
    rsa_ct.extend_from_slice(&tag);
    rsa_ct.extend_from_slice(exit_data);
    let session_key_bytes = rsa_oaep::decrypt(recipient_key, &rsa_ct)?;
    if session_key_bytes.len() != SECRET_LEN {
        return Err(OnionError::MalformedPayload("recovered session key has unexpected length"));
    }
    let mut session_key = [0u8; SECRET_LEN];
    session_key.copy_from_slice(&session_key_bytes);

    let keys = Keyset::new(session_key).lioness_keys(END_TO_END_ENCRYPT_MODE);
    lioness::decrypt(&keys, payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use duskrelay_core::ServerInfo;
    use rand::rngs::OsRng;

    struct TestServer {
        der: Vec<u8>,
    }

    impl ServerInfo for TestServer {
        fn nickname(&self) -> &str {
            "test"
        }
        fn packet_key_der(&self) -> &[u8] {
            &self.der
        }
        fn keyid(&self) -> [u8; 20] {
            [0u8; 20]
        }
        fn routing_info(&self, _swap: bool) -> duskrelay_core::RoutingInfo {
            duskrelay_core::RoutingInfo::drop()
        }
        fn supports_packet_version(&self, _major: u8, _minor: u8) -> bool {
            true
        }
        fn valid_until(&self) -> u32 {
            u32::MAX
        }
    }

    fn test_server() -> TestServer {
        let sk = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let pk = rsa::RsaPublicKey::from(&sk);
        let der = rsa::pkcs8::EncodePublicKey::to_public_key_der(&pk).unwrap().as_bytes().to_vec();
        TestServer { der }
    }

    #[test]
    fn reply_round_trips_through_try_decode() {
        let server = test_server();
        let servers: Vec<&dyn ServerInfo> = vec![&server];
        let mut rng = OsRng;
        let mut prng = duskrelay_crypto::AesCounterPrng::new([3u8; 16]);

        let (block, _seed) = crate::surb::build_reply_block(
            &mut rng,
            &mut prng,
            &servers,
            duskrelay_core::constants::DROP_TYPE,
            &[],
            b"bob",
            0,
        )
        .unwrap();

        let original_payload = crate::encode::build_random_payload(&mut prng);
        let mut payload = original_payload;
        let keys = Keyset::new(block.shared_key).lioness_keys(PAYLOAD_ENCRYPT_MODE);
        lioness::encrypt(&keys, &mut payload);

        let candidates = vec![[0u8; SECRET_LEN], block.shared_key, [1u8; SECRET_LEN]];
        let (idx, recovered) = try_decode_reply(&payload, &candidates).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(recovered, original_payload);
    }

    #[test]
    fn encrypted_forward_round_trips() {
        let mut rng = OsRng;
        let recipient_sk = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let recipient_pk = rsa::RsaPublicKey::from(&recipient_sk);

        let mut session_key = [7u8; SECRET_LEN];
        let rsa_ct = rsa_oaep::encrypt(&mut rng, &recipient_pk, &session_key).unwrap();
        session_key.fill(0); // the builder never reuses the key after this point

        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&rsa_ct[..TAG_LEN]);
        let exit_data = rsa_ct[TAG_LEN..].to_vec();

        let mut payload = [9u8; PAYLOAD_LEN];
        let original = payload;
        let keys = Keyset::new([7u8; SECRET_LEN]).lioness_keys(END_TO_END_ENCRYPT_MODE);
        lioness::encrypt(&keys, &mut payload);

        decode_encrypted_forward(&recipient_sk, tag, &exit_data, &mut payload).unwrap();
        assert_eq!(payload, original);
    }

    #[test]
    fn decode_payload_passes_through_plain_forward() {
        let mut prng = duskrelay_crypto::AesCounterPrng::new([4u8; 16]);
        let message = crate::encode::CompressedMessage(b"hello".to_vec());
        let payload = crate::encode::encode_message(&message, &mut prng).unwrap().remove(0);

        let mut ret_nym = Vec::new();
        let out = decode_payload(&payload, None, &[], None, &[], &mut ret_nym).unwrap();
        assert!(matches!(out, Some(duskrelay_core::Payload::Singleton { ref data, .. }) if data == b"hello"));
        assert!(ret_nym.is_empty());
    }

    #[test]
    fn decode_payload_with_no_tag_and_no_match_returns_none() {
        let payload = [9u8; PAYLOAD_LEN];
        let mut ret_nym = Vec::new();
        let out = decode_payload(&payload, None, &[], None, &[], &mut ret_nym).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn decode_payload_recovers_reply_through_user_key() {
        let server = test_server();
        let servers: Vec<&dyn ServerInfo> = vec![&server];
        let mut rng = OsRng;
        let mut prng = duskrelay_crypto::AesCounterPrng::new([6u8; 16]);

        let (block, seed) = crate::surb::build_reply_block(
            &mut rng,
            &mut prng,
            &servers,
            duskrelay_core::constants::DROP_TYPE,
            &[],
            b"bob",
            0,
        )
        .unwrap();

        let message = crate::encode::CompressedMessage(b"reply payload".to_vec());
        let original_payload = crate::encode::encode_message(&message, &mut prng).unwrap().remove(0);
        let mut payload = original_payload;
        let keys = Keyset::new(block.shared_key).lioness_keys(PAYLOAD_ENCRYPT_MODE);
        lioness::encrypt(&keys, &mut payload);

        let user_keys = vec![("bob".to_string(), b"bob".to_vec())];
        let mut ret_nym = Vec::new();
        let out = decode_payload(&payload, Some(seed.0), &[], None, &user_keys, &mut ret_nym).unwrap();
        assert!(matches!(out, Some(duskrelay_core::Payload::Singleton { ref data, .. }) if data == b"reply payload"));
        assert_eq!(ret_nym, vec!["bob".to_string()]);
    }

    #[test]
    fn decode_payload_surb_canary_pass_but_corrupt_raises_error() {
        // A tag that validates against the user key's canary but was never
        // actually produced by `build_reply_block` for this payload: none
        // of the 17 candidate secrets will make it well-formed.
        let user_key = b"carol".to_vec();
        let mut tag = [0u8; TAG_LEN];
        loop {
            use rand::RngCore;
            rand::rngs::OsRng.fill_bytes(&mut tag);
            tag[0] &= 0x7f;
            if validate_hash(&tag, &user_key)[DIGEST_LEN - 1] == 0 {
                break;
            }
        }
        let payload = [3u8; PAYLOAD_LEN];
        let user_keys = vec![("carol".to_string(), user_key)];
        let mut ret_nym = Vec::new();
        let err = decode_payload(&payload, Some(tag), &[], None, &user_keys, &mut ret_nym).unwrap_err();
        assert!(matches!(err, OnionError::CorruptPayload));
    }

    #[test]
    fn decode_payload_recovers_encrypted_forward() {
        let mut rng = OsRng;
        let recipient_sk = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let recipient_pk = rsa::RsaPublicKey::from(&recipient_sk);

        let session_key = [7u8; SECRET_LEN];
        let rsa_ct = rsa_oaep::encrypt(&mut rng, &recipient_pk, &session_key).unwrap();
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&rsa_ct[..TAG_LEN]);
        let exit_data = rsa_ct[TAG_LEN..].to_vec();

        let mut prng = duskrelay_crypto::AesCounterPrng::new([8u8; 16]);
        let message = crate::encode::CompressedMessage(b"forwarded".to_vec());
        let original_payload = crate::encode::encode_message(&message, &mut prng).unwrap().remove(0);
        let mut payload = original_payload;
        let keys = Keyset::new(session_key).lioness_keys(END_TO_END_ENCRYPT_MODE);
        lioness::encrypt(&keys, &mut payload);

        let mut ret_nym = Vec::new();
        let out = decode_payload(&payload, Some(tag), &exit_data, Some(&recipient_sk), &[], &mut ret_nym).unwrap();
        assert!(matches!(out, Some(duskrelay_core::Payload::Singleton { ref data, .. }) if data == b"forwarded"));
        assert!(ret_nym.is_empty());
    }
}
