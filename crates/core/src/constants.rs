//! Fixed sizes for the packet network. Every size here is exact: this is a
//! fixed-size packet system, not a variable-length one.

/// Size of a single onion header, in bytes.
pub const HEADER_LEN: usize = 2048;

/// Size of the payload carried by a packet, in bytes (28 KiB).
pub const PAYLOAD_LEN: usize = 28 * 1024;

/// Size of a packet: two headers plus one payload.
pub const PACKET_LEN: usize = 2 * HEADER_LEN + PAYLOAD_LEN;

/// Length of a SHA-1 digest/tag field.
pub const DIGEST_LEN: usize = 20;

/// Length of the decoding tag prepended to exit routing info.
pub const TAG_LEN: usize = 20;

/// Length of a per-hop master secret.
pub const SECRET_LEN: usize = 16;

/// Bytes consumed by a Singleton payload's fixed fields (2-byte
/// size-and-flag field + 20-byte hash).
pub const SINGLETON_PAYLOAD_OVERHEAD: usize = 22;

/// Bytes consumed by a Fragment payload's fixed fields (3-byte
/// index-and-flag field + 20-byte hash + 20-byte message id + 4-byte
/// total length).
pub const FRAGMENT_PAYLOAD_OVERHEAD: usize = 47;

/// Length of a fragmented message's message-id field.
pub const FRAGMENT_MESSAGEID_LEN: usize = 20;

/// Asymmetric overhead added to an encrypted-forward payload: the session
/// key and RSA-OAEP padding cost, net of the 20 bytes we save by spilling
/// the decoding tag into the exit routing info.
pub const ENC_FWD_OVERHEAD: usize = 42;

/// Smallest routing type code reserved for exit (final-hop) nodes.
pub const MIN_EXIT_TYPE: u16 = 0x0100;

/// Routing type: drop this packet without forwarding (used for padding).
pub const DROP_TYPE: u16 = 0x0000;

/// Routing type: forward to an IPv4 relay.
pub const FWD_IPV4_TYPE: u16 = 0x0001;

/// Routing type: forward to a relay addressed by hostname.
pub const FWD_HOST_TYPE: u16 = 0x0002;

/// Routing type: forward to an IPv4 relay, and also mark this as the
/// crossover point between the two path legs ("swap").
pub const SWAP_FWD_IPV4_TYPE: u16 = 0x0003;

/// Routing type: forward to a relay addressed by hostname, and mark this
/// as the crossover point between the two path legs ("swap").
pub const SWAP_FWD_HOST_TYPE: u16 = 0x0004;

/// Reserved routing type for fragment-aware exit delivery. The fragment
/// reassembly module itself is an external collaborator (see spec §6);
/// this code just reserves the routing-type namespace slot for it.
pub const FRAGMENT_TYPE: u16 = MIN_EXIT_TYPE;

/// RSA modulus size, in bytes, used by all server packet keys (2048-bit
/// keys).
pub const RSA_MODULUS_BYTES: usize = 256;

/// RSA-OAEP overhead (with SHA-1 as both hash and MGF1 hash):
/// `2 * hLen + 2`.
pub const OAEP_OVERHEAD: usize = 42;

/// Maximum plaintext length OAEP can encrypt under [`RSA_MODULUS_BYTES`].
pub const PK_ENC_DATA_LEN: usize = RSA_MODULUS_BYTES - OAEP_OVERHEAD;

/// Fixed-length prefix of a packed [`crate::Subheader`]: major(1) +
/// minor(1) + secret(16) + digest(20) + routing type(2) + routing info
/// length(2).
pub const MIN_SUBHEADER_LEN: usize = 1 + 1 + SECRET_LEN + DIGEST_LEN + 2 + 2;

/// Size, in bytes, of the RSA-encrypted portion of a subheader once
/// packed onto the wire. Always exactly one RSA block.
pub const ENC_SUBHEADER_LEN: usize = RSA_MODULUS_BYTES;

/// Current packet format major/minor version this codec understands.
pub const MAJOR_NO: u8 = 0;
pub const MINOR_NO: u8 = 3;

/// Maximum number of secrets a SURB decode attempt will try before
/// concluding the payload is corrupt. One more than any plausible path
/// length.
pub const MAX_REPLY_SECRETS: usize = 17;
