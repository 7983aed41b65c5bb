//! Building and peeling a single fixed-size onion header, one hop at a
//! time. This is the inner machinery behind the Onion Builder: each hop
//! is wrapped RSA-OAEP-outward, back to front, so that the header a
//! sender transmits can be peeled by each hop in turn using only that
//! hop's own private key plus the per-hop secret it recovers.
//!
//! Per hop `i`, `header_space(i) = len(ri) + OAEP_OVERHEAD +
//! MIN_SUBHEADER_LEN` bytes of the header are consumed: one RSA block
//! (`ENC_SUBHEADER_LEN` bytes, always present) plus, if the subheader's
//! fixed prefix and routing info don't fill that RSA block on their
//! own, some header padding is borrowed forward into it (underflow);
//! if they overflow it, the excess routing info bytes spill out into
//! the plaintext just after the RSA block (overflow). Either way the
//! header stays exactly `HEADER_LEN` bytes at every hop.

use duskrelay_core::constants::{
    DIGEST_LEN, ENC_SUBHEADER_LEN, HEADER_LEN, MIN_SUBHEADER_LEN, PK_ENC_DATA_LEN, SECRET_LEN,
};
use duskrelay_core::types::Prng;
use duskrelay_core::{Header, RoutingInfo, Subheader};
use duskrelay_crypto::keyset::{HEADER_SECRET_MODE, RANDOM_JUNK_MODE};
use duskrelay_crypto::prng::ctr_crypt_at;
use duskrelay_crypto::{rsa_oaep, Keyset};
use rand_core::CryptoRngCore;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::{OnionError, Result};
use crate::path::HeaderHop;

fn sha1(data: &[u8]) -> [u8; DIGEST_LEN] {
    use sha1::{Digest, Sha1};
    let mut h = Sha1::new();
    h.update(data);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&h.finalize());
    out
}

fn header_secret_keystream(secret: [u8; SECRET_LEN], data: &mut [u8]) {
    let ks = Keyset::new(secret);
    let key = ks.single_key(HEADER_SECRET_MODE);
    let mut prng = duskrelay_crypto::AesCounterPrng::new(key);
    let mut ks_buf = vec![0u8; data.len()];
    prng.fill_bytes(&mut ks_buf);
    for (d, k) in data.iter_mut().zip(ks_buf.iter()) {
        *d ^= k;
    }
}

/// The deterministic junk chain every hop's digest commits to:
/// `junk[i]` is the padding a real relay chain will already have
/// appended to hop `i`'s header by the time hop `i` peels it (empty for
/// the entry hop, which receives a freshly built packet with no
/// forwarding history yet). Per hop, `header_space()` fresh bytes are
/// drawn from that hop's own `RANDOM_JUNK_MODE` key and folded into the
/// running chain, then the whole chain-so-far is re-encrypted under
/// that hop's header key starting wherever its own header content's
/// keystream left off — the same continuation [`forward_header`]
/// performs one hop at a time on the relay side, so a sender can
/// precompute every hop's commitment up front without simulating the
/// whole forwarding chain.
fn precompute_junk(hops: &[HeaderHop], secrets: &[[u8; SECRET_LEN]]) -> Vec<Vec<u8>> {
    let mut junk = vec![Vec::new()];
    for (hop, secret) in hops.iter().zip(secrets) {
        let ks = Keyset::new(*secret);
        let header_key = ks.single_key(HEADER_SECRET_MODE);
        let mut new_junk = vec![0u8; hop.header_space()];
        duskrelay_crypto::AesCounterPrng::new(ks.single_key(RANDOM_JUNK_MODE)).fill_bytes(&mut new_junk);

        let prior = junk.last().unwrap();
        let mut combined = prior.clone();
        combined.extend_from_slice(&new_junk);
        let offset = HEADER_LEN - hop.header_space() - prior.len();
        ctr_crypt_at(header_key, &mut combined, offset);
        junk.push(combined);
    }
    junk
}

/// Wrap one hop's subheader around `core` (the header content this hop
/// will decrypt to reveal), producing the header that hop receives on
/// the wire (`core.len() + hop.header_space()` bytes). `junk` is the
/// deterministic padding chain a real relay will have appended by the
/// time this hop peels it (see [`precompute_junk`]); it is folded into
/// the digest but never written into `core` itself, since a freshly
/// built packet has no forwarding history to match against.
fn wrap_hop<R: CryptoRngCore>(
    rng: &mut R,
    core: &[u8],
    secret: [u8; SECRET_LEN],
    hop: &HeaderHop,
    junk: &[u8],
) -> Result<Vec<u8>> {
    let mut ciphertext = core.to_vec();
    header_secret_keystream(secret, &mut ciphertext);
    let mut digest_input = ciphertext.clone();
    digest_input.extend_from_slice(junk);
    let digest = sha1(&digest_input);

    let sub = Subheader::new(secret, digest, hop.routing.clone());
    let plain = sub.pack();
    let needed = plain.len();

    let (rsa_plain, rest) = if needed <= PK_ENC_DATA_LEN {
        let underflow_len = PK_ENC_DATA_LEN - needed;
        let mut rsa_plain = plain;
        rsa_plain.extend_from_slice(&ciphertext[..underflow_len]);
        (rsa_plain, ciphertext[underflow_len..].to_vec())
    } else {
        let rsa_plain = plain[..PK_ENC_DATA_LEN].to_vec();
        let mut rest = plain[PK_ENC_DATA_LEN..].to_vec();
        rest.extend_from_slice(&ciphertext);
        (rsa_plain, rest)
    };

    let rsa_ct = rsa_oaep::encrypt(rng, &hop.packet_key, &rsa_plain)?;
    let mut wire = rsa_ct;
    wire.extend_from_slice(&rest);
    debug_assert_eq!(wire.len(), core.len() + hop.header_space());
    Ok(wire)
}

/// Build a complete header over `hops` (outermost hop first), drawing
/// fresh per-hop secrets from `prng`. Returns the header along with the
/// secrets in the same (outermost-first) order, which the caller needs
/// to whiten the payload and the companion header during assembly.
pub fn build_header<R: CryptoRngCore>(
    rng: &mut R,
    prng: &mut dyn Prng,
    hops: &[HeaderHop],
) -> Result<(Header, Vec<[u8; SECRET_LEN]>)> {
    if hops.is_empty() {
        return Err(OnionError::EmptyPath);
    }
    let mut secrets = vec![[0u8; SECRET_LEN]; hops.len()];
    for s in secrets.iter_mut() {
        let b = prng.bytes(SECRET_LEN);
        s.copy_from_slice(&b);
    }
    let header = build_header_with_secrets(rng, prng, hops, &secrets)?;
    Ok((header, secrets))
}

/// Build a complete header over `hops` (outermost hop first) using
/// caller-supplied per-hop `secrets`, rather than drawing fresh ones.
/// [`crate::surb::build_reply_block`] needs this: a SURB's header
/// secrets are derived deterministically from its seed and user key,
/// not drawn from the ambient PRNG.
pub fn build_header_with_secrets<R: CryptoRngCore>(
    rng: &mut R,
    prng: &mut dyn Prng,
    hops: &[HeaderHop],
    secrets: &[[u8; SECRET_LEN]],
) -> Result<Header> {
    if hops.is_empty() {
        return Err(OnionError::EmptyPath);
    }
    if secrets.len() != hops.len() {
        return Err(OnionError::MalformedPayload("secret count must match hop count"));
    }
    let n = hops.len();
    let total_size: usize = hops.iter().map(|h| h.header_space()).sum();
    if total_size > HEADER_LEN {
        return Err(OnionError::PathTooLong { leg: "single" });
    }

    let junk = precompute_junk(hops, secrets);

    // Build from the exit hop inward, growing a buffer of pure header
    // content (never any junk mixed in — junk only ever exists on the
    // wire once a relay actually forwards the packet). It starts at
    // the padding a fully-packed header has left over and grows by
    // exactly each wrapped hop's own header_space, reaching HEADER_LEN
    // once the entry hop is wrapped.
    let mut core = prng.bytes(HEADER_LEN - total_size);
    for i in (0..n).rev() {
        core = wrap_hop(rng, &core, secrets[i], &hops[i], &junk[i])?;
    }

    let mut bytes = [0u8; HEADER_LEN];
    bytes.copy_from_slice(&core);
    Ok(Header::from_bytes(bytes))
}

/// The result of peeling one hop off a header.
pub struct PeeledHop {
    pub secret: [u8; SECRET_LEN],
    pub routing: RoutingInfo,
    /// Remaining header content, `HEADER_LEN - header_space` bytes.
    /// For a non-exit hop this must be padded back out to `HEADER_LEN`
    /// (with arbitrary filler; its contents are never checked again)
    /// before being forwarded.
    pub core: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum PeelError {
    #[error(transparent)]
    Onion(#[from] OnionError),
    #[error("subheader digest did not match its claimed content")]
    BadDigest,
}

/// Peel one hop off `header` using `private_key`. This is the mirror
/// image of [`build_header`]'s per-hop wrapping, used both to model
/// relay-side processing and to exercise the builder in round-trip
/// tests.
pub fn peel_header(header: &Header, private_key: &RsaPrivateKey) -> std::result::Result<PeeledHop, PeelError> {
    let wire = header.as_bytes();
    let rsa_ct = &wire[..ENC_SUBHEADER_LEN];
    let rsa_plain = rsa_oaep::decrypt(private_key, rsa_ct).map_err(OnionError::from)?;

    let prefix = Subheader::parse_prefix(&rsa_plain).map_err(OnionError::from)?;
    let needed = MIN_SUBHEADER_LEN + prefix.ri_len;

    let (info, ciphertext) = if needed <= PK_ENC_DATA_LEN {
        let underflow_len = PK_ENC_DATA_LEN - needed;
        let info = rsa_plain[MIN_SUBHEADER_LEN..MIN_SUBHEADER_LEN + prefix.ri_len].to_vec();
        let mut rest = rsa_plain[needed..needed + underflow_len].to_vec();
        rest.extend_from_slice(&wire[ENC_SUBHEADER_LEN..]);
        (info, rest)
    } else {
        let overflow_len = needed - PK_ENC_DATA_LEN;
        let mut info = rsa_plain[MIN_SUBHEADER_LEN..PK_ENC_DATA_LEN].to_vec();
        info.extend_from_slice(&wire[ENC_SUBHEADER_LEN..ENC_SUBHEADER_LEN + overflow_len]);
        let rest = wire[ENC_SUBHEADER_LEN + overflow_len..].to_vec();
        (info, rest)
    };

    if sha1(&ciphertext) != prefix.digest {
        return Err(PeelError::BadDigest);
    }

    let secret = prefix.secret;
    let sub = Subheader::from_prefix(prefix, info);
    let mut core = ciphertext;
    header_secret_keystream(secret, &mut core);

    Ok(PeeledHop { secret, routing: sub.routing, core })
}

/// Pad a peeled hop's remaining core back out to a full header so it
/// can be forwarded. The appended bytes are this hop's own slice of
/// the deterministic junk chain [`precompute_junk`] computes in
/// advance on the sending side: the next hop's digest check already
/// commits to them, so they have to come out byte-for-byte identical
/// here, derived only from `secret` (the master secret this hop just
/// recovered by peeling its own layer).
pub fn forward_header(core: Vec<u8>, secret: [u8; SECRET_LEN]) -> Header {
    let space = HEADER_LEN - core.len();
    let ks = Keyset::new(secret);
    let header_key = ks.single_key(HEADER_SECRET_MODE);
    let mut new_junk = vec![0u8; space];
    duskrelay_crypto::AesCounterPrng::new(ks.single_key(RANDOM_JUNK_MODE)).fill_bytes(&mut new_junk);
    let offset = core.len();
    ctr_crypt_at(header_key, &mut new_junk, offset);

    let mut bytes = core;
    bytes.extend_from_slice(&new_junk);
    let mut out = [0u8; HEADER_LEN];
    out.copy_from_slice(&bytes);
    Header::from_bytes(out)
}

/// Build the `RsaPublicKey` side of a packet key, for tests and any
/// caller that generated a private key directly rather than receiving
/// server-published DER bytes.
pub fn public_key_of(sk: &RsaPrivateKey) -> RsaPublicKey {
    RsaPublicKey::from(sk)
}
