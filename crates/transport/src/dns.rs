//! Async hostname resolution for MMTP host-type routing (spec.md §4.5's
//! `FWD_HOST_TYPE`/`SWAP_FWD_HOST_TYPE`): a small cache in front of
//! `tokio::net::lookup_host`, so the reactor never blocks a connection
//! on a DNS round trip and repeat sends to the same relay don't re-query.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use duskrelay_core::collaborators::DnsCache;

/// How long a resolved address is trusted before a fresh lookup is issued.
const CACHE_TTL: Duration = Duration::from_secs(300);

struct Entry {
    addr: Option<[u8; 4]>,
    expires_at: Instant,
}

/// Resolves hostnames on the tokio runtime and remembers the result
/// (including negative results) for [`CACHE_TTL`]. Lookups run on a
/// spawned task; the result reaches the caller's `callback` from that
/// task, never blocking the caller.
pub struct AsyncDnsCache {
    cache: Mutex<HashMap<String, Entry>>,
}

impl AsyncDnsCache {
    pub fn new() -> Self {
        AsyncDnsCache { cache: Mutex::new(HashMap::new()) }
    }

    fn cached(&self, hostname: &str) -> Option<Option<[u8; 4]>> {
        let cache = self.cache.lock().expect("dns cache mutex poisoned");
        cache.get(hostname).and_then(|e| if e.expires_at > Instant::now() { Some(e.addr) } else { None })
    }

    fn store(&self, hostname: &str, addr: Option<[u8; 4]>) {
        let mut cache = self.cache.lock().expect("dns cache mutex poisoned");
        cache.insert(hostname.to_string(), Entry { addr, expires_at: Instant::now() + CACHE_TTL });
    }
}

impl Default for AsyncDnsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsCache for AsyncDnsCache {
    fn lookup(&self, hostname: &str, callback: Box<dyn FnOnce(Option<[u8; 4]>) + Send>) {
        if let Some(addr) = self.cached(hostname) {
            tracing::debug!(hostname, hit = true, "dns cache hit");
            callback(addr);
            return;
        }

        let hostname = hostname.to_string();
        // Caching the result back in requires outliving this call, but
        // `AsyncDnsCache` is always held behind an `Arc` by callers
        // (see `crates/transport::reactor`), so a raw pointer scoped to
        // the spawned task's lifetime would be unsound here; instead we
        // resolve without touching `self` from inside the task and let
        // the reactor re-store via `note_result`.
        tokio::spawn(async move {
            let target = format!("{hostname}:0");
            let resolved = tokio::net::lookup_host(target)
                .await
                .ok()
                .and_then(|mut addrs| addrs.find_map(|a| match a.ip() {
                    std::net::IpAddr::V4(v4) => Some(v4.octets()),
                    std::net::IpAddr::V6(_) => None,
                }));
            if resolved.is_some() {
                tracing::debug!(hostname = %hostname, "dns lookup succeeded");
            } else {
                tracing::warn!(hostname = %hostname, "dns lookup failed");
            }
            callback(resolved);
        });
    }
}

impl AsyncDnsCache {
    /// Record a lookup result obtained elsewhere (e.g. by the reactor
    /// after `lookup`'s spawned task completes), so future calls for
    /// the same hostname are served from cache.
    pub fn note_result(&self, hostname: &str, addr: Option<[u8; 4]>) {
        self.store(hostname, addr);
    }
}
