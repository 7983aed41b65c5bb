//! Packing and parsing of the wire-level payload and packet formats.
//! Pure functions: no crypto, no I/O, no randomness.

use crate::constants::*;
use crate::error::{CoreError, Result};
use crate::types::{Header, Packet, Payload, Subheader};

fn sha1(data: &[u8]) -> [u8; DIGEST_LEN] {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(data);
    let out = hasher.finalize();
    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&out);
    digest
}

/// True if the leading bit of a decoded payload's first byte is set,
/// meaning this is a fragment rather than a singleton.
fn is_fragment(payload: &[u8]) -> bool {
    payload[0] & 0x80 != 0
}

/// Verify a payload's embedded hash without fully parsing it. Returns
/// false for structurally short buffers rather than erroring: payload
/// validity is a boolean question, decided once per received packet.
pub fn check_payload(payload: &[u8; PAYLOAD_LEN]) -> bool {
    if is_fragment(payload) {
        if payload.len() < FRAGMENT_PAYLOAD_OVERHEAD {
            return false;
        }
        let want = &payload[3..3 + DIGEST_LEN];
        sha1(&payload[FRAGMENT_PAYLOAD_OVERHEAD..]) == *want
    } else {
        if payload.len() < SINGLETON_PAYLOAD_OVERHEAD {
            return false;
        }
        let want = &payload[2..2 + DIGEST_LEN];
        sha1(&payload[SINGLETON_PAYLOAD_OVERHEAD..]) == *want
    }
}

/// Pack a Singleton payload: `data` plus random `padding` must together
/// fill exactly PAYLOAD_LEN - SINGLETON_PAYLOAD_OVERHEAD bytes.
pub fn pack_singleton(data: &[u8], padding: &[u8]) -> Result<[u8; PAYLOAD_LEN]> {
    let size = data.len();
    if size > 0x7fff {
        return Err(CoreError::MalformedPayload("singleton data too large for 15-bit size field"));
    }
    if data.len() + padding.len() != PAYLOAD_LEN - SINGLETON_PAYLOAD_OVERHEAD {
        return Err(CoreError::MalformedPayload("singleton data+padding must fill the payload"));
    }
    let mut out = [0u8; PAYLOAD_LEN];
    out[0..2].copy_from_slice(&(size as u16).to_be_bytes());
    // high bit of byte 0 stays clear: singleton flag.
    let hash = sha1(&[data, padding].concat());
    out[2..2 + DIGEST_LEN].copy_from_slice(&hash);
    out[SINGLETON_PAYLOAD_OVERHEAD..SINGLETON_PAYLOAD_OVERHEAD + size].copy_from_slice(data);
    out[SINGLETON_PAYLOAD_OVERHEAD + size..].copy_from_slice(padding);
    Ok(out)
}

/// Parse and validate a Singleton payload, returning its data with
/// padding stripped.
pub fn parse_singleton(payload: &[u8; PAYLOAD_LEN]) -> Result<Payload> {
    if is_fragment(payload) {
        return Err(CoreError::MalformedPayload("expected singleton, found fragment flag"));
    }
    if !check_payload(payload) {
        return Err(CoreError::CorruptPayload);
    }
    let size = u16::from_be_bytes([payload[0], payload[1]]) as usize;
    if SINGLETON_PAYLOAD_OVERHEAD + size > PAYLOAD_LEN {
        return Err(CoreError::MalformedPayload("singleton size field exceeds payload"));
    }
    let data = payload[SINGLETON_PAYLOAD_OVERHEAD..SINGLETON_PAYLOAD_OVERHEAD + size].to_vec();
    Ok(Payload::Singleton { data })
}

/// Pack a Fragment payload. `data` must be exactly
/// `PAYLOAD_LEN - FRAGMENT_PAYLOAD_OVERHEAD` bytes (the caller pads the
/// final fragment of a message to this length).
pub fn pack_fragment(
    index: u32,
    msgid: [u8; FRAGMENT_MESSAGEID_LEN],
    total_len: u32,
    data: &[u8],
) -> Result<[u8; PAYLOAD_LEN]> {
    if index > 0x7f_ffff {
        return Err(CoreError::MalformedPayload("fragment index too large for 23-bit field"));
    }
    if data.len() != PAYLOAD_LEN - FRAGMENT_PAYLOAD_OVERHEAD {
        return Err(CoreError::MalformedPayload("fragment data must fill the payload"));
    }
    let mut out = [0u8; PAYLOAD_LEN];
    let tagged = index | 0x0080_0000;
    out[0..3].copy_from_slice(&tagged.to_be_bytes()[1..4]);
    let hash = sha1(&[&msgid[..], &total_len.to_be_bytes()[..], data].concat());
    out[3..3 + DIGEST_LEN].copy_from_slice(&hash);
    let mut off = 3 + DIGEST_LEN;
    out[off..off + FRAGMENT_MESSAGEID_LEN].copy_from_slice(&msgid);
    off += FRAGMENT_MESSAGEID_LEN;
    out[off..off + 4].copy_from_slice(&total_len.to_be_bytes());
    off += 4;
    out[off..].copy_from_slice(data);
    Ok(out)
}

/// Parse and validate a Fragment payload.
pub fn parse_fragment(payload: &[u8; PAYLOAD_LEN]) -> Result<Payload> {
    if !is_fragment(payload) {
        return Err(CoreError::MalformedPayload("expected fragment, found singleton flag"));
    }
    if !check_payload(payload) {
        return Err(CoreError::CorruptPayload);
    }
    let index = u32::from_be_bytes([0, payload[0], payload[1], payload[2]]) & 0x007f_ffff;
    let mut msgid = [0u8; FRAGMENT_MESSAGEID_LEN];
    msgid.copy_from_slice(&payload[23..23 + FRAGMENT_MESSAGEID_LEN]);
    let off = 23 + FRAGMENT_MESSAGEID_LEN;
    let total_len = u32::from_be_bytes([payload[off], payload[off + 1], payload[off + 2], payload[off + 3]]);
    let data = payload[FRAGMENT_PAYLOAD_OVERHEAD..].to_vec();
    Ok(Payload::Fragment { index, msgid, total_len, data })
}

/// Parse whichever of Singleton or Fragment a payload's flag bit
/// indicates, after validating its hash.
pub fn parse_payload(payload: &[u8; PAYLOAD_LEN]) -> Result<Payload> {
    if is_fragment(payload) {
        parse_fragment(payload)
    } else {
        parse_singleton(payload)
    }
}

/// Serialize a subheader: fixed prefix (secret, digest, routing type,
/// routing info length) followed by the routing info bytes themselves.
pub fn pack_subheader(sub: &Subheader) -> Vec<u8> {
    sub.pack()
}

/// Parse a complete subheader, routing info included. Onion header
/// construction parses the fixed prefix and routing info separately
/// instead, since a subheader can be split across an RSA block and an
/// overflow region; see [`Subheader::parse_prefix`] for that case.
pub fn parse_subheader(buf: &[u8]) -> Result<Subheader> {
    Subheader::parse(buf)
}

pub fn pack_packet(header1: &Header, header2: &Header, payload: &[u8; PAYLOAD_LEN]) -> [u8; PACKET_LEN] {
    let mut out = [0u8; PACKET_LEN];
    out[0..HEADER_LEN].copy_from_slice(header1.as_bytes());
    out[HEADER_LEN..2 * HEADER_LEN].copy_from_slice(header2.as_bytes());
    out[2 * HEADER_LEN..].copy_from_slice(payload);
    out
}

pub fn parse_packet(bytes: &[u8; PACKET_LEN]) -> Packet {
    let mut header1 = [0u8; HEADER_LEN];
    header1.copy_from_slice(&bytes[0..HEADER_LEN]);
    let mut header2 = [0u8; HEADER_LEN];
    header2.copy_from_slice(&bytes[HEADER_LEN..2 * HEADER_LEN]);
    let mut payload = [0u8; PAYLOAD_LEN];
    payload.copy_from_slice(&bytes[2 * HEADER_LEN..]);
    Packet { header1: Header(header1), header2: Header(header2), payload }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padding(n: usize) -> Vec<u8> {
        vec![0xAB; n]
    }

    #[test]
    fn singleton_round_trip() {
        let data = b"hello mix network".to_vec();
        let pad = padding(PAYLOAD_LEN - SINGLETON_PAYLOAD_OVERHEAD - data.len());
        let packed = pack_singleton(&data, &pad).unwrap();
        assert!(check_payload(&packed));
        match parse_singleton(&packed).unwrap() {
            Payload::Singleton { data: got } => assert_eq!(got, data),
            _ => panic!("expected singleton"),
        }
    }

    #[test]
    fn singleton_rejects_fragment_flag() {
        let data = b"x".to_vec();
        let pad = padding(PAYLOAD_LEN - SINGLETON_PAYLOAD_OVERHEAD - data.len());
        let mut packed = pack_singleton(&data, &pad).unwrap();
        packed[0] |= 0x80;
        assert!(parse_singleton(&packed).is_err());
    }

    #[test]
    fn singleton_corrupt_hash_rejected() {
        let data = b"hello".to_vec();
        let pad = padding(PAYLOAD_LEN - SINGLETON_PAYLOAD_OVERHEAD - data.len());
        let mut packed = pack_singleton(&data, &pad).unwrap();
        packed[SINGLETON_PAYLOAD_OVERHEAD] ^= 0xff;
        assert!(!check_payload(&packed));
        assert!(matches!(parse_singleton(&packed), Err(CoreError::CorruptPayload)));
    }

    #[test]
    fn fragment_round_trip() {
        let data = vec![0x42u8; PAYLOAD_LEN - FRAGMENT_PAYLOAD_OVERHEAD];
        let msgid = [7u8; FRAGMENT_MESSAGEID_LEN];
        let packed = pack_fragment(3, msgid, 90_000, &data).unwrap();
        assert!(check_payload(&packed));
        match parse_fragment(&packed).unwrap() {
            Payload::Fragment { index, msgid: got_id, total_len, data: got } => {
                assert_eq!(index, 3);
                assert_eq!(got_id, msgid);
                assert_eq!(total_len, 90_000);
                assert_eq!(got, data);
            }
            _ => panic!("expected fragment"),
        }
    }

    #[test]
    fn parse_payload_dispatches_on_flag() {
        let s_data = b"s".to_vec();
        let pad = padding(PAYLOAD_LEN - SINGLETON_PAYLOAD_OVERHEAD - s_data.len());
        let s = pack_singleton(&s_data, &pad).unwrap();
        assert!(matches!(parse_payload(&s).unwrap(), Payload::Singleton { .. }));

        let f_data = vec![1u8; PAYLOAD_LEN - FRAGMENT_PAYLOAD_OVERHEAD];
        let f = pack_fragment(0, [0u8; FRAGMENT_MESSAGEID_LEN], 1, &f_data).unwrap();
        assert!(matches!(parse_payload(&f).unwrap(), Payload::Fragment { .. }));
    }

    #[test]
    fn subheader_round_trip() {
        use crate::types::{RoutingInfo, Subheader};
        let sub = Subheader::new([9u8; SECRET_LEN], [1u8; DIGEST_LEN], RoutingInfo { rt: 3, info: vec![0xCD; 6] });
        let packed = pack_subheader(&sub);
        let parsed = parse_subheader(&packed).unwrap();
        assert_eq!(parsed, sub);
    }

    #[test]
    fn packet_round_trip() {
        let h1 = Header([1u8; HEADER_LEN]);
        let h2 = Header([2u8; HEADER_LEN]);
        let payload = [3u8; PAYLOAD_LEN];
        let packed = pack_packet(&h1, &h2, &payload);
        let parsed = parse_packet(&packed);
        assert_eq!(parsed.header1, h1);
        assert_eq!(parsed.header2, h2);
        assert_eq!(parsed.payload, payload);
    }
}
