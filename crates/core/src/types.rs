use crate::constants::*;
use crate::error::{CoreError, Result};

/// Source of random bytes used by the onion builder for padding, junk,
/// and secret generation. Implemented over the AES-CTR PRNG in
/// `duskrelay-crypto`, kept here as a trait so the codec and builder can
/// be exercised in tests without pulling in a crypto dependency.
pub trait Prng {
    fn fill_bytes(&mut self, buf: &mut [u8]);

    fn bytes(&mut self, n: usize) -> Vec<u8> {
        let mut v = vec![0u8; n];
        self.fill_bytes(&mut v);
        v
    }
}

/// A routing-type code paired with its type-specific routing info. This
/// is the uninterpreted (type, info) pair named in spec.md §3; use the
/// constructors and accessors below to work with specific encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingInfo {
    pub rt: u16,
    pub info: Vec<u8>,
}

impl RoutingInfo {
    pub fn drop() -> Self {
        RoutingInfo { rt: DROP_TYPE, info: Vec::new() }
    }

    pub fn ipv4(ipv4: [u8; 4], port: u16, keyid: [u8; DIGEST_LEN], swap: bool) -> Self {
        let mut info = Vec::with_capacity(4 + 2 + DIGEST_LEN);
        info.extend_from_slice(&ipv4);
        info.extend_from_slice(&port.to_be_bytes());
        info.extend_from_slice(&keyid);
        RoutingInfo {
            rt: if swap { SWAP_FWD_IPV4_TYPE } else { FWD_IPV4_TYPE },
            info,
        }
    }

    pub fn host(hostname: &str, port: u16, keyid: [u8; DIGEST_LEN], swap: bool) -> Self {
        let mut info = Vec::with_capacity(2 + 2 + hostname.len() + DIGEST_LEN);
        info.extend_from_slice(&(hostname.len() as u16).to_be_bytes());
        info.extend_from_slice(hostname.as_bytes());
        info.extend_from_slice(&port.to_be_bytes());
        info.extend_from_slice(&keyid);
        RoutingInfo { rt: if swap { SWAP_FWD_HOST_TYPE } else { FWD_HOST_TYPE }, info }
    }

    /// Build an exit routing info: a 20-byte decoding tag followed by
    /// exit-type-specific bytes. `exit_type` must be >= MIN_EXIT_TYPE.
    pub fn exit(exit_type: u16, tag: [u8; TAG_LEN], data: &[u8]) -> Self {
        debug_assert!(exit_type >= MIN_EXIT_TYPE);
        let mut info = Vec::with_capacity(TAG_LEN + data.len());
        info.extend_from_slice(&tag);
        info.extend_from_slice(data);
        RoutingInfo { rt: exit_type, info }
    }

    pub fn is_exit(&self) -> bool {
        self.rt >= MIN_EXIT_TYPE
    }

    pub fn is_swap(&self) -> bool {
        matches!(self.rt, SWAP_FWD_IPV4_TYPE | SWAP_FWD_HOST_TYPE)
    }

    /// Decode an IPv4 relay code's fields.
    pub fn as_ipv4(&self) -> Option<([u8; 4], u16, [u8; DIGEST_LEN])> {
        if !matches!(self.rt, FWD_IPV4_TYPE | SWAP_FWD_IPV4_TYPE) {
            return None;
        }
        if self.info.len() != 4 + 2 + DIGEST_LEN {
            return None;
        }
        let mut ipv4 = [0u8; 4];
        ipv4.copy_from_slice(&self.info[0..4]);
        let port = u16::from_be_bytes([self.info[4], self.info[5]]);
        let mut keyid = [0u8; DIGEST_LEN];
        keyid.copy_from_slice(&self.info[6..6 + DIGEST_LEN]);
        Some((ipv4, port, keyid))
    }

    /// Decode a hostname relay code's fields.
    pub fn as_host(&self) -> Option<(String, u16, [u8; DIGEST_LEN])> {
        if !matches!(self.rt, FWD_HOST_TYPE | SWAP_FWD_HOST_TYPE) {
            return None;
        }
        if self.info.len() < 2 {
            return None;
        }
        let hostlen = u16::from_be_bytes([self.info[0], self.info[1]]) as usize;
        if self.info.len() != 2 + hostlen + 2 + DIGEST_LEN {
            return None;
        }
        let hostname = String::from_utf8(self.info[2..2 + hostlen].to_vec()).ok()?;
        let off = 2 + hostlen;
        let port = u16::from_be_bytes([self.info[off], self.info[off + 1]]);
        let mut keyid = [0u8; DIGEST_LEN];
        keyid.copy_from_slice(&self.info[off + 2..off + 2 + DIGEST_LEN]);
        Some((hostname, port, keyid))
    }

    /// Decoding tag carried by an exit routing info, if this is one.
    pub fn exit_tag(&self) -> Option<[u8; TAG_LEN]> {
        if !self.is_exit() || self.info.len() < TAG_LEN {
            return None;
        }
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&self.info[..TAG_LEN]);
        Some(tag)
    }

    pub fn exit_data(&self) -> Option<&[u8]> {
        if !self.is_exit() || self.info.len() < TAG_LEN {
            return None;
        }
        Some(&self.info[TAG_LEN..])
    }
}

/// One hop's worth of header material: the per-hop master secret, the
/// digest binding it to the rest of the header, and the routing
/// instructions for where this hop forwards the packet.
/// The fixed-length prefix fields of a [`Subheader`], parsed ahead of
/// knowing where its routing info bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubheaderPrefix {
    pub major: u8,
    pub minor: u8,
    pub secret: [u8; SECRET_LEN],
    pub digest: [u8; DIGEST_LEN],
    pub rt: u16,
    pub ri_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subheader {
    pub major: u8,
    pub minor: u8,
    pub secret: [u8; SECRET_LEN],
    pub digest: [u8; DIGEST_LEN],
    pub routing: RoutingInfo,
}

impl Subheader {
    pub fn new(secret: [u8; SECRET_LEN], digest: [u8; DIGEST_LEN], routing: RoutingInfo) -> Self {
        Subheader { major: MAJOR_NO, minor: MINOR_NO, secret, digest, routing }
    }

    /// Total serialized length of this subheader: fixed prefix plus
    /// routing info.
    pub fn packed_len(&self) -> usize {
        MIN_SUBHEADER_LEN + self.routing.info.len()
    }

    /// Bytes of routing info that do not fit inside one RSA block
    /// alongside the fixed prefix; these spill into the plaintext
    /// (CTR-encrypted) part of the header, immediately after the
    /// RSA-encrypted block.
    pub fn overflow_len(&self) -> usize {
        let needed = MIN_SUBHEADER_LEN + self.routing.info.len();
        needed.saturating_sub(PK_ENC_DATA_LEN)
    }

    /// Bytes of header padding this subheader's RSA block can absorb
    /// because its own fixed prefix + routing info don't fill it. These
    /// bytes are lifted from the front of the remaining header plaintext
    /// before RSA encryption, so the ciphertext stays exactly one RSA
    /// block and the header as a whole stays HEADER_LEN bytes.
    pub fn underflow_len(&self) -> usize {
        let needed = MIN_SUBHEADER_LEN + self.routing.info.len();
        PK_ENC_DATA_LEN.saturating_sub(needed)
    }

    /// Total bytes of header space this hop consumes, per spec.md
    /// §4.2.1: `len(ri) + OAEP_OVERHEAD + MIN_SUBHEADER_LEN`.
    pub fn header_space(&self) -> usize {
        self.routing.info.len() + OAEP_OVERHEAD + MIN_SUBHEADER_LEN
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.packed_len());
        out.push(self.major);
        out.push(self.minor);
        out.extend_from_slice(&self.secret);
        out.extend_from_slice(&self.digest);
        out.extend_from_slice(&self.routing.rt.to_be_bytes());
        out.extend_from_slice(&(self.routing.info.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.routing.info);
        out
    }

    /// Parse just the fixed-length prefix, without requiring the full
    /// routing info to be present in `buf`. Used when a subheader's
    /// routing info was split across an RSA block and an overflow
    /// region: the caller reassembles the full info bytes itself and
    /// calls [`Subheader::from_prefix`].
    pub fn parse_prefix(buf: &[u8]) -> Result<SubheaderPrefix> {
        if buf.len() < MIN_SUBHEADER_LEN {
            return Err(CoreError::MalformedPayload("subheader shorter than fixed prefix"));
        }
        let major = buf[0];
        let minor = buf[1];
        let mut secret = [0u8; SECRET_LEN];
        secret.copy_from_slice(&buf[2..2 + SECRET_LEN]);
        let mut off = 2 + SECRET_LEN;
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&buf[off..off + DIGEST_LEN]);
        off += DIGEST_LEN;
        let rt = u16::from_be_bytes([buf[off], buf[off + 1]]);
        off += 2;
        let ri_len = u16::from_be_bytes([buf[off], buf[off + 1]]) as usize;
        Ok(SubheaderPrefix { major, minor, secret, digest, rt, ri_len })
    }

    pub fn from_prefix(prefix: SubheaderPrefix, info: Vec<u8>) -> Self {
        Subheader {
            major: prefix.major,
            minor: prefix.minor,
            secret: prefix.secret,
            digest: prefix.digest,
            routing: RoutingInfo { rt: prefix.rt, info },
        }
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < MIN_SUBHEADER_LEN {
            return Err(CoreError::MalformedPayload("subheader shorter than fixed prefix"));
        }
        let major = buf[0];
        let minor = buf[1];
        let mut secret = [0u8; SECRET_LEN];
        secret.copy_from_slice(&buf[2..2 + SECRET_LEN]);
        let mut off = 2 + SECRET_LEN;
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&buf[off..off + DIGEST_LEN]);
        off += DIGEST_LEN;
        let rt = u16::from_be_bytes([buf[off], buf[off + 1]]);
        off += 2;
        let ri_len = u16::from_be_bytes([buf[off], buf[off + 1]]) as usize;
        off += 2;
        if buf.len() < off + ri_len {
            return Err(CoreError::MalformedPayload("subheader routing info truncated"));
        }
        let info = buf[off..off + ri_len].to_vec();
        Ok(Subheader { major, minor, secret, digest, routing: RoutingInfo { rt, info } })
    }
}

/// A fixed-size, opaque onion header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header(pub [u8; HEADER_LEN]);

impl Header {
    pub fn from_bytes(bytes: [u8; HEADER_LEN]) -> Self {
        Header(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HEADER_LEN] {
        &self.0
    }
}

/// A decoded payload: either a complete, self-contained message, or one
/// fragment of a larger one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Singleton { data: Vec<u8> },
    Fragment { index: u32, msgid: [u8; FRAGMENT_MESSAGEID_LEN], total_len: u32, data: Vec<u8> },
}

/// A fixed-size onion packet: two headers and one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header1: Header,
    pub header2: Header,
    pub payload: [u8; PAYLOAD_LEN],
}

/// A single-use reply block: everything a sender needs to build a
/// reply packet without knowing the recipient's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyBlock {
    pub header: Header,
    pub expiry: u32,
    pub first_hop: RoutingInfo,
    pub shared_key: [u8; SECRET_LEN],
}
