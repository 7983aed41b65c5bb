//! Wire format, codec, and shared collaborator interfaces for the
//! packet engine. This crate is pure: no crypto, no I/O, no async
//! runtime. `duskrelay-crypto` and `duskrelay-onion` build on top of
//! the types and functions exported here.

pub mod codec;
pub mod collaborators;
pub mod constants;
pub mod error;
pub mod types;

pub use collaborators::{DnsCache, EventLog, PacketConsumer, PingLog, ServerInfo};
pub use error::{CoreError, Result};
pub use types::{Header, Packet, Payload, Prng, ReplyBlock, RoutingInfo, Subheader, SubheaderPrefix};
