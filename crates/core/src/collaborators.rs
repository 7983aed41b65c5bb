//! Thin interfaces onto systems this crate treats as external
//! collaborators (spec.md §6): server directory info, DNS resolution,
//! delivered-packet consumption, and event/ping logging. None of these
//! are implemented here beyond minimal in-memory doubles useful for
//! tests; real implementations live in `duskrelay-transport` and the
//! directory-facing code that consumes this crate.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::constants::DIGEST_LEN;
use crate::types::RoutingInfo;

/// Everything the onion builder and transport need to know about a
/// server: its packet key, how to route to it, and its nickname. The
/// packet key is carried as DER-encoded SubjectPublicKeyInfo bytes so
/// this crate does not need to depend on an RSA implementation; callers
/// that need the parsed key use `duskrelay-crypto`.
pub trait ServerInfo: Send + Sync {
    fn nickname(&self) -> &str;
    fn packet_key_der(&self) -> &[u8];
    fn keyid(&self) -> [u8; DIGEST_LEN];
    fn routing_info(&self, swap: bool) -> RoutingInfo;
    fn supports_packet_version(&self, major: u8, minor: u8) -> bool;
    fn valid_until(&self) -> u32;
}

/// Asynchronous hostname resolution, decoupled from any particular
/// async runtime. `lookup` must eventually invoke `callback` exactly
/// once, either with a resolved IPv4 address or `None` on failure.
/// `Send + Sync` since implementations are shared across the reactor's
/// accept loop and per-connection tasks via `Arc`.
pub trait DnsCache: Send + Sync {
    fn lookup(&self, hostname: &str, callback: Box<dyn FnOnce(Option<[u8; 4]>) + Send>);
}

/// Receives packets that have reached the end of their path on this
/// node (exit delivery, reply delivery).
pub trait PacketConsumer: Send + Sync {
    fn on_packet(&self, packet: [u8; crate::constants::PACKET_LEN]);
}

/// Named counters for operational visibility. Intentionally coarse:
/// full statistics rotation/reporting is out of scope, this is just a
/// sink for ambient counting.
pub trait EventLog: Send + Sync {
    fn count(&self, event: &str);
    fn count_tagged(&self, event: &str, tag: &str);
}

/// Per-peer connectivity notifications, used to keep a directory's view
/// of which servers are currently reachable up to date.
pub trait PingLog: Send + Sync {
    fn connected(&self, keyid: [u8; DIGEST_LEN]);
    fn connect_failed(&self, keyid: [u8; DIGEST_LEN]);
}

/// An in-memory `EventLog` double: counts events by name (and
/// optionally by name+tag) for assertions in tests.
#[derive(Default)]
pub struct TestEventLog {
    counts: Mutex<HashMap<String, u64>>,
}

impl TestEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, event: &str) -> u64 {
        *self.counts.lock().unwrap().get(event).unwrap_or(&0)
    }
}

impl EventLog for TestEventLog {
    fn count(&self, event: &str) {
        *self.counts.lock().unwrap().entry(event.to_string()).or_insert(0) += 1;
    }

    fn count_tagged(&self, event: &str, tag: &str) {
        let key = format!("{event}:{tag}");
        self.count(&key);
    }
}

/// An in-memory `PingLog` double recording every notification it
/// receives, in order.
#[derive(Default)]
pub struct TestPingLog {
    events: Mutex<Vec<(bool, [u8; DIGEST_LEN])>>,
}

impl TestPingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(bool, [u8; DIGEST_LEN])> {
        self.events.lock().unwrap().clone()
    }
}

impl PingLog for TestPingLog {
    fn connected(&self, keyid: [u8; DIGEST_LEN]) {
        self.events.lock().unwrap().push((true, keyid));
    }

    fn connect_failed(&self, keyid: [u8; DIGEST_LEN]) {
        self.events.lock().unwrap().push((false, keyid));
    }
}
