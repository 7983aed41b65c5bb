//! MMTP transport: async TLS server and client for the 32 KiB-packet
//! wire protocol (spec.md §4.5), built on tokio and rustls. This crate
//! knows nothing about onion construction or payload semantics — it
//! moves opaque packets and reports per-packet delivery outcomes.

pub mod bucket;
pub mod cert_cache;
pub mod client;
pub mod deliverable;
pub mod dns;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod reactor;
pub mod server;
pub mod tls;

pub use bucket::TokenBucket;
pub use cert_cache::{CertFingerprintCache, CertStatus};
pub use deliverable::{BoxedDeliverable, Deliverable, PacketKind};
pub use dns::AsyncDnsCache;
pub use error::{Result, TransportError};
pub use pool::{ConnectFn, ConnectionPool};
pub use reactor::Reactor;
pub use server::RejectMode;
pub use tls::{NodeIdentity, ServerContext};
