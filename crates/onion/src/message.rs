//! Assembling the two headers and payload of a complete packet, and the
//! "swap" step that binds them together at the path-1/path-2 crossover.
//!
//! Building order (per hop secrets listed outermost-first):
//!
//! 1. Unless this is a reply (whose payload is instead whitened once
//!    under the reply block's own shared key), whiten the payload under
//!    each path-2 secret, applied innermost-first.
//! 2. Encrypt header2 under keys derived from the (now payload-2-
//!    whitened) payload, binding header2 to that exact payload.
//! 3. Encrypt the payload under keys derived from that freshly-wrapped
//!    header2 — the "swap" — binding the payload right back to header2.
//! 4. Whiten both header2 and the payload under each path-1 secret,
//!    applied outermost-last (so the first hop on path 1 is the last
//!    layer peeled off first).

use duskrelay_core::constants::{DIGEST_LEN, HEADER_LEN, PACKET_LEN, PAYLOAD_LEN, SECRET_LEN, TAG_LEN};
use duskrelay_core::types::Prng;
use duskrelay_core::{Header, ReplyBlock, RoutingInfo, ServerInfo};
use duskrelay_crypto::keyset::{END_TO_END_ENCRYPT_MODE, HEADER_ENCRYPT_MODE, PAYLOAD_ENCRYPT_MODE};
use duskrelay_crypto::{lioness, rsa_oaep, Keyset, LionessKeys};
use rand_core::CryptoRngCore;
use rsa::RsaPublicKey;

use crate::error::Result;
use crate::header::build_header;
use crate::path::{check_path_length, hops_for_path, HeaderHop};

fn sha1(data: &[u8]) -> [u8; DIGEST_LEN] {
    use sha1::{Digest, Sha1};
    let mut h = Sha1::new();
    h.update(data);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&h.finalize());
    out
}

/// Derive a LIONESS four-tuple from arbitrary data (a payload or a
/// header), rather than from a per-hop secret, binding header2 and the
/// payload to each other's exact bytes at the swap point.
fn lioness_keys_from_bytes(data: &[u8], mode: &[u8]) -> LionessKeys {
    let digest = sha1(data);
    let mut master = [0u8; SECRET_LEN];
    master.copy_from_slice(&digest[..SECRET_LEN]);
    Keyset::new(master).lioness_keys(mode)
}

fn whiten_with_secrets_reversed(block: &mut [u8], secrets: &[[u8; SECRET_LEN]], mode: &[u8]) {
    for secret in secrets.iter().rev() {
        let keys = Keyset::new(*secret).lioness_keys(mode);
        lioness::encrypt(&keys, block);
    }
}

fn unwhiten_with_secrets(block: &mut [u8], secrets: &[[u8; SECRET_LEN]], mode: &[u8]) {
    for secret in secrets {
        let keys = Keyset::new(*secret).lioness_keys(mode);
        lioness::decrypt(&keys, block);
    }
}

/// Assemble two already-built headers and a payload into the final
/// wire bytes of a packet, applying the header2/payload swap and the
/// path-1 whitening passes. `path1_secrets` and `path2_secrets` are in
/// outermost-first (hop 0 first) order, matching what
/// [`crate::header::build_header`] returns. If `payload_preencrypted`
/// is true (a reply whose payload was already whitened once under a
/// reply block's shared key), the path-2 whitening pass is skipped;
/// the swap step itself still always runs.
pub fn construct_message(
    header1: Header,
    header2: Header,
    mut payload: [u8; PAYLOAD_LEN],
    path1_secrets: &[[u8; SECRET_LEN]],
    path2_secrets: &[[u8; SECRET_LEN]],
    payload_preencrypted: bool,
) -> [u8; PACKET_LEN] {
    if !payload_preencrypted {
        whiten_with_secrets_reversed(&mut payload, path2_secrets, PAYLOAD_ENCRYPT_MODE);
    }

    let mut header2_bytes = *header2.as_bytes();
    let keys_from_payload = lioness_keys_from_bytes(&payload, HEADER_ENCRYPT_MODE);
    lioness::encrypt(&keys_from_payload, &mut header2_bytes);

    let keys_from_header2 = lioness_keys_from_bytes(&header2_bytes, PAYLOAD_ENCRYPT_MODE);
    lioness::encrypt(&keys_from_header2, &mut payload);

    whiten_with_secrets_reversed(&mut header2_bytes, path1_secrets, HEADER_ENCRYPT_MODE);
    whiten_with_secrets_reversed(&mut payload, path1_secrets, PAYLOAD_ENCRYPT_MODE);

    duskrelay_core::codec::pack_packet(&header1, &Header::from_bytes(header2_bytes), &payload)
}

/// Reverse [`construct_message`]'s swap/whitening, given both legs'
/// secrets (in the same outermost-first order used to build them).
/// Used to model relay-side unwrapping for round-trip tests.
pub fn deconstruct_message(
    mut header2_bytes: [u8; HEADER_LEN],
    mut payload: [u8; PAYLOAD_LEN],
    path1_secrets: &[[u8; SECRET_LEN]],
    path2_secrets: &[[u8; SECRET_LEN]],
) -> ([u8; HEADER_LEN], [u8; PAYLOAD_LEN]) {
    unwhiten_with_secrets(&mut payload, path1_secrets, PAYLOAD_ENCRYPT_MODE);
    unwhiten_with_secrets(&mut header2_bytes, path1_secrets, HEADER_ENCRYPT_MODE);

    let keys_from_header2 = lioness_keys_from_bytes(&header2_bytes, PAYLOAD_ENCRYPT_MODE);
    lioness::decrypt(&keys_from_header2, &mut payload);

    let keys_from_payload = lioness_keys_from_bytes(&payload, HEADER_ENCRYPT_MODE);
    lioness::decrypt(&keys_from_payload, &mut header2_bytes);

    unwhiten_with_secrets(&mut payload, path2_secrets, PAYLOAD_ENCRYPT_MODE);

    (header2_bytes, payload)
}

/// Build a forward packet: a plaintext payload carried to `exit_type`
/// delivery at the end of `path2`, routed there via `path1`.
pub fn build_forward<R: CryptoRngCore>(
    rng: &mut R,
    prng: &mut dyn Prng,
    path1: &[&dyn ServerInfo],
    path2: &[&dyn ServerInfo],
    exit_routing: RoutingInfo,
    payload: [u8; PAYLOAD_LEN],
) -> Result<[u8; PACKET_LEN]> {
    let path2_hops: Vec<HeaderHop> = hops_for_path(path2, exit_routing, None)?;
    check_path_length("second", &path2_hops)?;
    let (header2, path2_secrets) = build_header(rng, prng, &path2_hops)?;

    let swap_routing = path2[0].routing_info(true);
    let path1_hops: Vec<HeaderHop> = hops_for_path(path1, swap_routing, Some(path1.len() - 1))?;
    check_path_length("first", &path1_hops)?;
    let (header1, path1_secrets) = build_header(rng, prng, &path1_hops)?;

    Ok(construct_message(header1, header2, payload, &path1_secrets, &path2_secrets, false))
}

/// Build a reply packet from a previously issued reply block: the
/// payload is whitened once under the block's shared key before
/// assembly, and path-2 whitening is skipped since `reply_block`'s own
/// header already has path 2 baked in.
pub fn build_reply<R: CryptoRngCore>(
    rng: &mut R,
    prng: &mut dyn Prng,
    path1: &[&dyn ServerInfo],
    reply_block: &ReplyBlock,
    mut payload: [u8; PAYLOAD_LEN],
) -> Result<[u8; PACKET_LEN]> {
    let keys = Keyset::new(reply_block.shared_key).lioness_keys(PAYLOAD_ENCRYPT_MODE);
    lioness::encrypt(&keys, &mut payload);

    let path1_hops: Vec<HeaderHop> =
        hops_for_path(path1, reply_block.first_hop.clone(), Some(path1.len() - 1))?;
    check_path_length("first", &path1_hops)?;
    let (header1, path1_secrets) = build_header(rng, prng, &path1_hops)?;

    Ok(construct_message(header1, reply_block.header.clone(), payload, &path1_secrets, &[], true))
}

/// Build an encrypted-forward packet: the payload is encrypted
/// end-to-end for an exit-side recipient identified by `recipient_key`.
/// A fresh 16-byte session key is RSA-OAEP encrypted under the
/// recipient's key and LIONESS-whitens the payload under
/// `END_TO_END_ENCRYPT_MODE`; the leading `TAG_LEN` bytes of the RSA
/// ciphertext become the exit routing info's decoding tag, with the
/// rest of the RSA ciphertext prepended to the whitened payload so the
/// exit can reassemble and decrypt it.
pub fn build_encrypted_forward<R: CryptoRngCore>(
    rng: &mut R,
    prng: &mut dyn Prng,
    path1: &[&dyn ServerInfo],
    path2: &[&dyn ServerInfo],
    exit_type: u16,
    recipient_key: &RsaPublicKey,
    mut payload: [u8; PAYLOAD_LEN],
) -> Result<[u8; PACKET_LEN]> {
    let mut session_key = [0u8; SECRET_LEN];
    session_key.copy_from_slice(&prng.bytes(SECRET_LEN));

    let rsa_ct = rsa_oaep::encrypt(rng, recipient_key, &session_key)?;
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&rsa_ct[..TAG_LEN]);

    let keys = Keyset::new(session_key).lioness_keys(END_TO_END_ENCRYPT_MODE);
    lioness::encrypt(&keys, &mut payload);

    let exit_ri = RoutingInfo::exit(exit_type, tag, &rsa_ct[TAG_LEN..]);

    let path2_hops: Vec<HeaderHop> = hops_for_path(path2, exit_ri, None)?;
    check_path_length("second", &path2_hops)?;
    let (header2, path2_secrets) = build_header(rng, prng, &path2_hops)?;

    let swap_routing = path2[0].routing_info(true);
    let path1_hops: Vec<HeaderHop> = hops_for_path(path1, swap_routing, Some(path1.len() - 1))?;
    check_path_length("first", &path1_hops)?;
    let (header1, path1_secrets) = build_header(rng, prng, &path1_hops)?;

    Ok(construct_message(header1, header2, payload, &path1_secrets, &path2_secrets, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_and_deconstruct_round_trip() {
        let h1 = Header::from_bytes([1u8; HEADER_LEN]);
        let h2 = Header::from_bytes([2u8; HEADER_LEN]);
        let payload = [3u8; PAYLOAD_LEN];
        let path1 = vec![[9u8; SECRET_LEN], [10u8; SECRET_LEN]];
        let path2 = vec![[11u8; SECRET_LEN]];

        let packet = construct_message(h1.clone(), h2, payload, &path1, &path2, false);
        let parsed = duskrelay_core::codec::parse_packet(&packet);
        assert_eq!(parsed.header1, h1);

        let (h2_bytes, recovered_payload) =
            deconstruct_message(*parsed.header2.as_bytes(), parsed.payload, &path1, &path2);
        assert_eq!(h2_bytes, [2u8; HEADER_LEN]);
        assert_eq!(recovered_payload, payload);
    }

    #[test]
    fn reply_skips_path2_whitening() {
        let h1 = Header::from_bytes([4u8; HEADER_LEN]);
        let h2 = Header::from_bytes([5u8; HEADER_LEN]);
        let payload = [6u8; PAYLOAD_LEN];
        let path1 = vec![[1u8; SECRET_LEN]];

        let packet = construct_message(h1, h2, payload, &path1, &[], true);
        let parsed = duskrelay_core::codec::parse_packet(&packet);
        let (h2_bytes, recovered_payload) =
            deconstruct_message(*parsed.header2.as_bytes(), parsed.payload, &path1, &[]);
        assert_eq!(h2_bytes, [5u8; HEADER_LEN]);
        assert_eq!(recovered_payload, payload);
    }
}
