//! Splitting an arbitrary byte string into the payload or payloads
//! needed to carry it, and building the all-junk payloads used for
//! cover traffic.

use duskrelay_core::codec;
use duskrelay_core::constants::{FRAGMENT_MESSAGEID_LEN, FRAGMENT_PAYLOAD_OVERHEAD, PAYLOAD_LEN, SINGLETON_PAYLOAD_OVERHEAD};
use duskrelay_core::types::Prng;

use crate::error::Result;

const SINGLETON_MAX: usize = PAYLOAD_LEN - SINGLETON_PAYLOAD_OVERHEAD;
const FRAGMENT_DATA_LEN: usize = PAYLOAD_LEN - FRAGMENT_PAYLOAD_OVERHEAD;

/// Bytes already run through whatever compression scheme the caller
/// uses, ready to be split into payloads. Compression itself is a
/// collaborator concern this crate does not implement; this newtype
/// just documents that `encode_message` expects its input already
/// compressed, not that it does any compressing.
pub struct CompressedMessage(pub Vec<u8>);

/// Split `message` into the payload(s) needed to carry it: a single
/// Singleton payload if it fits, or a run of Fragment payloads sharing
/// one freshly generated message id otherwise. The final fragment's
/// short tail is padded out with junk from `prng`, same as a
/// Singleton's unused space.
pub fn encode_message(message: &CompressedMessage, prng: &mut dyn Prng) -> Result<Vec<[u8; PAYLOAD_LEN]>> {
    let data = &message.0[..];
    if data.len() <= SINGLETON_MAX {
        let padding = prng.bytes(SINGLETON_MAX - data.len());
        return Ok(vec![codec::pack_singleton(data, &padding)?]);
    }

    let mut msgid = [0u8; FRAGMENT_MESSAGEID_LEN];
    msgid.copy_from_slice(&prng.bytes(FRAGMENT_MESSAGEID_LEN));
    let total_len = data.len() as u32;

    let mut out = Vec::with_capacity(data.len().div_ceil(FRAGMENT_DATA_LEN));
    for (i, chunk) in data.chunks(FRAGMENT_DATA_LEN).enumerate() {
        let mut buf = chunk.to_vec();
        if buf.len() < FRAGMENT_DATA_LEN {
            buf.extend(prng.bytes(FRAGMENT_DATA_LEN - buf.len()));
        }
        out.push(codec::pack_fragment(i as u32, msgid, total_len, &buf)?);
    }
    Ok(out)
}

/// Build a well-formed but empty Singleton payload, filled with junk.
/// Used for DROP cover packets: indistinguishable on the wire from a
/// real, very short message.
pub fn build_random_payload(prng: &mut dyn Prng) -> [u8; PAYLOAD_LEN] {
    let padding = prng.bytes(SINGLETON_MAX);
    codec::pack_singleton(&[], &padding).expect("empty Singleton payload always packs")
}
