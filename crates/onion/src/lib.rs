//! The onion packet builder: turning a chosen path and a message into
//! a fixed-size packet, and the per-hop and end-to-end primitives that
//! make that possible. Builds on the wire format in `duskrelay-core`
//! and the primitives in `duskrelay-crypto`.

pub mod decode;
pub mod encode;
pub mod error;
pub mod header;
pub mod message;
pub mod path;
pub mod surb;

pub use decode::{decode_encrypted_forward, decode_forward, decode_payload, try_decode_reply};
pub use encode::{build_random_payload, encode_message, CompressedMessage};
pub use error::{OnionError, Result};
pub use header::{build_header, build_header_with_secrets, forward_header, peel_header, public_key_of, PeelError, PeeledHop};
pub use message::{build_encrypted_forward, build_forward, build_reply, construct_message, deconstruct_message};
pub use path::{check_path_length, hops_for_path, HeaderHop};
pub use surb::{build_reply_block, verify_seed, ReplySeed};
