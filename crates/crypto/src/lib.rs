//! Cryptographic primitives for the packet engine: SHA-1 digests, the
//! AES-CTR PRNG, the tagged per-hop key schedule, the LIONESS
//! whitening cipher, and RSA-OAEP for packet keys.

pub mod digest;
pub mod error;
pub mod keyset;
pub mod lioness;
pub mod prng;
pub mod rsa_oaep;

pub use error::{CryptoError, Result};
pub use keyset::{Keyset, LionessKeys};
pub use prng::AesCounterPrng;
