//! Single-use reply blocks (SURBs): a header built over `path2` and a
//! shared key that together let someone who cannot speak to a
//! recipient directly still deliver a reply to them.
//!
//! A reply block is bound to a `user_key` the recipient controls. The
//! builder searches for a random 20-byte seed such that
//! `sha1(seed ++ user_key ++ "Validate")` ends in a zero byte, a cheap
//! canary the recipient can use to confirm a seed it is handed back
//! really was produced for their key before trusting anything else
//! about it. That same seed then reseeds an AES-CTR PRNG (keyed by
//! `sha1(seed ++ user_key ++ "Generate")[..16]`) to derive every
//! header secret and the shared key deterministically: handing the
//! recipient `(seed, user_key)` is enough for them to reconstruct
//! exactly what the reply block's secrets were, with nothing else to
//! remember. The seed itself becomes the exit hop's decoding tag, so
//! it travels inside the header rather than alongside it.
//!
//! A reply block cannot be built without a user key: an anonymous
//! reply path with no binding to its intended recipient is
//! indistinguishable from one built for anyone else's mailbox.

use duskrelay_core::constants::{DIGEST_LEN, SECRET_LEN, TAG_LEN};
use duskrelay_core::types::Prng;
use duskrelay_core::{ReplyBlock, RoutingInfo, ServerInfo};
use rand_core::CryptoRngCore;

use crate::error::{OnionError, Result};
use crate::header::build_header_with_secrets;
use crate::path::{check_path_length, hops_for_path};

const _: () = assert!(DIGEST_LEN == TAG_LEN, "a SURB seed doubles as the exit tag");

fn sha1(data: &[u8]) -> [u8; DIGEST_LEN] {
    use sha1::{Digest, Sha1};
    let mut h = Sha1::new();
    h.update(data);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&h.finalize());
    out
}

pub(crate) fn validate_hash(seed: &[u8; DIGEST_LEN], user_key: &[u8]) -> [u8; DIGEST_LEN] {
    let mut buf = Vec::with_capacity(DIGEST_LEN + user_key.len() + 8);
    buf.extend_from_slice(seed);
    buf.extend_from_slice(user_key);
    buf.extend_from_slice(b"Validate");
    sha1(&buf)
}

pub(crate) fn generate_key(seed: &[u8; DIGEST_LEN], user_key: &[u8]) -> [u8; SECRET_LEN] {
    let mut buf = Vec::with_capacity(DIGEST_LEN + user_key.len() + 8);
    buf.extend_from_slice(seed);
    buf.extend_from_slice(user_key);
    buf.extend_from_slice(b"Generate");
    let digest = sha1(&buf);
    let mut key = [0u8; SECRET_LEN];
    key.copy_from_slice(&digest[..SECRET_LEN]);
    key
}

/// The seed found during the validation search. It is both the proof
/// of binding to `user_key` and the exit hop's decoding tag baked into
/// the reply block's header; a recipient that gets a seed back (e.g.
/// attached to a delivered reply) can feed it straight to
/// [`verify_seed`].
pub struct ReplySeed(pub [u8; DIGEST_LEN]);

/// Build a reply block over `path2`, ending in an exit hop of
/// `exit_type` carrying `exit_data` (ordinarily enough for the
/// recipient's own mailbox to identify which reply this is), bound to
/// `user_key`. `prng` supplies the header's non-secret padding only;
/// every secret-dependent value is derived from the seed search below,
/// not drawn from `prng`.
pub fn build_reply_block<R: CryptoRngCore>(
    rng: &mut R,
    prng: &mut dyn Prng,
    path2: &[&dyn ServerInfo],
    exit_type: u16,
    exit_data: &[u8],
    user_key: &[u8],
    expiry: u32,
) -> Result<(ReplyBlock, ReplySeed)> {
    if user_key.is_empty() {
        return Err(OnionError::MalformedPayload("reply blocks require a non-empty user key"));
    }
    if path2.is_empty() {
        return Err(OnionError::EmptyPath);
    }

    let seed = loop {
        let mut candidate = [0u8; DIGEST_LEN];
        rng.fill_bytes(&mut candidate);
        candidate[0] &= 0x7f;
        if validate_hash(&candidate, user_key)[DIGEST_LEN - 1] == 0 {
            break candidate;
        }
    };

    let mut secret_stream = duskrelay_crypto::AesCounterPrng::new(generate_key(&seed, user_key));
    let n = path2.len();
    let mut raw_secrets = vec![[0u8; SECRET_LEN]; n + 1];
    for s in raw_secrets.iter_mut() {
        s.copy_from_slice(&secret_stream.bytes(SECRET_LEN));
    }
    let shared_key = raw_secrets[n];
    let mut header_secrets = raw_secrets[..n].to_vec();
    header_secrets.reverse();

    let exit_routing = RoutingInfo::exit(exit_type, seed, exit_data);
    let hops = hops_for_path(path2, exit_routing, None)?;
    check_path_length("reply", &hops)?;
    let header = build_header_with_secrets(rng, prng, &hops, &header_secrets)?;

    let first_hop = path2[0].routing_info(true);
    tracing::info!(hops = path2.len(), "generated surb");
    Ok((ReplyBlock { header, expiry, first_hop, shared_key }, ReplySeed(seed)))
}

/// Verify that `seed` was produced for `user_key` by
/// [`build_reply_block`]'s search, i.e. that this reply block really
/// was built for this recipient and not substituted in transit.
pub fn verify_seed(seed: &ReplySeed, user_key: &[u8]) -> bool {
    validate_hash(&seed.0, user_key)[DIGEST_LEN - 1] == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use duskrelay_core::constants::DROP_TYPE;
    use rand::rngs::OsRng;

    struct TestServer {
        der: Vec<u8>,
        routing: RoutingInfo,
    }

    impl ServerInfo for TestServer {
        fn nickname(&self) -> &str {
            "test"
        }
        fn packet_key_der(&self) -> &[u8] {
            &self.der
        }
        fn keyid(&self) -> [u8; DIGEST_LEN] {
            [0u8; DIGEST_LEN]
        }
        fn routing_info(&self, swap: bool) -> RoutingInfo {
            if swap {
                RoutingInfo { rt: duskrelay_core::constants::SWAP_FWD_HOST_TYPE, info: self.routing.info.clone() }
            } else {
                self.routing.clone()
            }
        }
        fn supports_packet_version(&self, _major: u8, _minor: u8) -> bool {
            true
        }
        fn valid_until(&self) -> u32 {
            u32::MAX
        }
    }

    fn test_server() -> TestServer {
        let sk = rsa::RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let pk = rsa::RsaPublicKey::from(&sk);
        let der = rsa::pkcs8::EncodePublicKey::to_public_key_der(&pk).unwrap().as_bytes().to_vec();
        TestServer { der, routing: RoutingInfo { rt: DROP_TYPE, info: Vec::new() } }
    }

    #[test]
    fn rejects_empty_user_key() {
        let server = test_server();
        let servers: Vec<&dyn ServerInfo> = vec![&server];
        let mut rng = OsRng;
        let mut prng = duskrelay_crypto::AesCounterPrng::new([1u8; 16]);
        let result = build_reply_block(&mut rng, &mut prng, &servers, DROP_TYPE, &[], b"", 0);
        assert!(matches!(result, Err(OnionError::MalformedPayload(_))));
    }

    #[test]
    fn builds_and_verifies_seed() {
        let server = test_server();
        let servers: Vec<&dyn ServerInfo> = vec![&server];
        let mut rng = OsRng;
        let mut prng = duskrelay_crypto::AesCounterPrng::new([2u8; 16]);
        let (block, seed) =
            build_reply_block(&mut rng, &mut prng, &servers, DROP_TYPE, &[], b"alice", 0).unwrap();
        assert!(verify_seed(&seed, b"alice"));
        assert!(!verify_seed(&seed, b"mallory"));
        assert_ne!(block.shared_key, [0u8; SECRET_LEN]);
        assert_eq!(block.first_hop.rt, duskrelay_core::constants::SWAP_FWD_HOST_TYPE);
    }

    #[test]
    fn same_seed_and_user_key_reproduce_shared_key() {
        let key1 = generate_key(&[5u8; DIGEST_LEN], b"carol");
        let key2 = generate_key(&[5u8; DIGEST_LEN], b"carol");
        assert_eq!(key1, key2);
    }
}
