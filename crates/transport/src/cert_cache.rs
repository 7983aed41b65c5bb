//! Peer certificate fingerprint cache (SPEC_FULL.md §3, carried
//! forward from the original `MMTPClient.PeerCertificateCache`): since
//! neither side validates the other's certificate chain (see
//! [`crate::tls`]), the only thing standing between "this is still the
//! same relay" and "something on the path swapped certs" across
//! reconnects is remembering what we saw last time and flagging a
//! change, rather than silently trusting whatever a new handshake
//! hands us.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;

use duskrelay_core::constants::DIGEST_LEN;

pub fn fingerprint(cert_der: &[u8]) -> [u8; DIGEST_LEN] {
    use sha1::{Digest, Sha1};
    let mut h = Sha1::new();
    h.update(cert_der);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&h.finalize());
    out
}

type Addr = (Ipv4Addr, u16, [u8; DIGEST_LEN]);

#[derive(Default)]
pub struct CertFingerprintCache {
    seen: Mutex<HashMap<Addr, [u8; DIGEST_LEN]>>,
}

/// What [`CertFingerprintCache::check`] learned about a peer's cert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
    /// First time we've connected to this address; fingerprint recorded.
    FirstSeen,
    /// Matches the fingerprint recorded on a previous connection.
    Unchanged,
    /// Differs from the fingerprint recorded on a previous connection.
    Changed,
}

impl CertFingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or compare `cert_der`'s fingerprint for `addr`. Never
    /// refuses a connection on its own — spec.md §4.5 doesn't ask the
    /// transport to enforce pinning, only to avoid needlessly
    /// re-deriving trust on every reconnect — callers that want to act
    /// on [`CertStatus::Changed`] (e.g. logging, alerting) may.
    pub fn check(&self, addr: Addr, cert_der: &[u8]) -> CertStatus {
        let fp = fingerprint(cert_der);
        let mut seen = self.seen.lock().expect("cert cache mutex poisoned");
        match seen.insert(addr, fp) {
            None => CertStatus::FirstSeen,
            Some(prev) if prev == fp => CertStatus::Unchanged,
            Some(_) => CertStatus::Changed,
        }
    }
}
