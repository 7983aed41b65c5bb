//! Outbound dispatch and connection pooling (spec.md §4.5.3):
//! `send_packets_by_routing`, the pending-packet spillover queue, and
//! the per-address connection registry. Grounded in the original
//! server's `_sendPackets`/`_sendQueuedPackets`/`sendPacketsByRouting`
//! trio, reshaped around an explicit drain step the reactor drives
//! once per tick instead of a bespoke event-loop callback.

use std::collections::HashMap;
use std::future::Future;
use std::net::Ipv4Addr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use duskrelay_core::collaborators::DnsCache;
use duskrelay_core::constants::DIGEST_LEN;
use duskrelay_core::types::RoutingInfo;

use crate::deliverable::BoxedDeliverable;

/// Identifies one outbound MMTP connection: destination address, port,
/// and the relay's keyid (so two relays sharing an IP are never
/// conflated).
pub type ConnKey = (Ipv4Addr, u16, [u8; DIGEST_LEN]);

/// One batch of packets resolved to a concrete address, waiting to be
/// handed to `_send_packets`.
struct QueuedSend {
    key: ConnKey,
    deliverables: Vec<BoxedDeliverable>,
}

type ConnectFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Dials `key` and serves the connection end to end (negotiation,
/// relaying everything pushed onto `inbox`, ping-log notification on
/// failure); supplied by the caller so this crate's pool logic stays
/// decoupled from the concrete TLS/tokio dial, matching how
/// `duskrelay-core`'s collaborator traits keep `core` decoupled from
/// its callers.
pub type ConnectFn = Arc<dyn Fn(ConnKey, mpsc::UnboundedReceiver<BoxedDeliverable>) -> ConnectFuture + Send + Sync>;

pub struct ConnectionPool {
    connect: ConnectFn,
    max_connections: usize,
    active: Mutex<HashMap<ConnKey, mpsc::UnboundedSender<BoxedDeliverable>>>,
    pending: Mutex<Vec<QueuedSend>>,
    queue_tx: mpsc::UnboundedSender<QueuedSend>,
    queue_rx: Mutex<mpsc::UnboundedReceiver<QueuedSend>>,
    open_count: AtomicUsize,
}

impl ConnectionPool {
    pub fn new(max_connections: usize, connect: ConnectFn) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Arc::new(ConnectionPool {
            connect,
            max_connections,
            active: Mutex::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
            queue_tx,
            queue_rx: Mutex::new(queue_rx),
            open_count: AtomicUsize::new(0),
        })
    }

    pub fn active_connection_count(&self) -> usize {
        self.active.lock().expect("pool mutex poisoned").len()
    }

    pub fn pending_batch_count(&self) -> usize {
        self.pending.lock().expect("pool mutex poisoned").len()
    }

    /// Entry point matching spec.md §4.5.3 step 1: dispatch IPv4 targets
    /// onto the queue right away, and resolve host targets through
    /// `dns` first. Either way, the packets reach `_send_packets` only
    /// through the next `drain` call, so this never touches the active
    /// map directly and is safe to call from any thread.
    pub fn send_packets_by_routing(
        self: &Arc<Self>,
        routing: &RoutingInfo,
        deliverables: Vec<BoxedDeliverable>,
        dns: &dyn DnsCache,
    ) {
        if let Some((ipv4, port, keyid)) = routing.as_ipv4() {
            let key = (Ipv4Addr::from(ipv4), port, keyid);
            let _ = self.queue_tx.send(QueuedSend { key, deliverables });
            return;
        }

        if let Some((hostname, port, keyid)) = routing.as_host() {
            let queue_tx = self.queue_tx.clone();
            dns.lookup(
                &hostname,
                Box::new(move |resolved| match resolved {
                    Some(ipv4) => {
                        let key = (Ipv4Addr::from(ipv4), port, keyid);
                        let _ = queue_tx.send(QueuedSend { key, deliverables });
                    }
                    None => {
                        for d in deliverables {
                            d.failed(true);
                        }
                    }
                }),
            );
            return;
        }

        tracing::warn!("send_packets_by_routing called with non-relay routing info");
        for d in deliverables {
            d.failed(false);
        }
    }

    /// Drain everything posted to the message queue since the last
    /// call, dispatch it via `_send_packets`, then try to open
    /// connections for anything still spilled over in `pending`. Must
    /// be called once per reactor tick (spec.md §4.5.3 step 2).
    pub fn drain(self: &Arc<Self>) {
        let mut batches = Vec::new();
        {
            let mut rx = self.queue_rx.lock().expect("pool mutex poisoned");
            while let Ok(qs) = rx.try_recv() {
                batches.push(qs);
            }
        }
        for qs in batches {
            self.send_packets(qs);
        }
        self.drain_pending();
    }

    fn send_packets(self: &Arc<Self>, qs: QueuedSend) {
        let existing = {
            let active = self.active.lock().expect("pool mutex poisoned");
            active.get(&qs.key).cloned()
        };
        if let Some(tx) = existing {
            for d in qs.deliverables {
                let _ = tx.send(d);
            }
            return;
        }

        if self.open_count.load(Ordering::SeqCst) < self.max_connections {
            self.open_connection(qs);
        } else {
            self.pending.lock().expect("pool mutex poisoned").push(qs);
        }
    }

    fn drain_pending(self: &Arc<Self>) {
        loop {
            if self.open_count.load(Ordering::SeqCst) >= self.max_connections {
                return;
            }
            let next = self.pending.lock().expect("pool mutex poisoned").pop();
            match next {
                Some(qs) => self.send_packets(qs),
                None => return,
            }
        }
    }

    fn open_connection(self: &Arc<Self>, qs: QueuedSend) {
        let (tx, rx) = mpsc::unbounded_channel();
        for d in qs.deliverables {
            let _ = tx.send(d);
        }
        self.active.lock().expect("pool mutex poisoned").insert(qs.key, tx);
        self.open_count.fetch_add(1, Ordering::SeqCst);

        let pool = Arc::clone(self);
        let key = qs.key;
        let connect = Arc::clone(&self.connect);
        tokio::spawn(async move {
            (connect)(key, rx).await;
            pool.active.lock().expect("pool mutex poisoned").remove(&key);
            pool.open_count.fetch_sub(1, Ordering::SeqCst);
            pool.drain_pending();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duskrelay_core::constants::PACKET_LEN;
    use std::sync::atomic::AtomicUsize as Counter;
    use std::time::Duration;

    struct FakeDns;
    impl DnsCache for FakeDns {
        fn lookup(&self, hostname: &str, callback: Box<dyn FnOnce(Option<[u8; 4]>) + Send>) {
            if hostname == "relay.example" {
                callback(Some([10, 0, 0, 5]));
            } else {
                callback(None);
            }
        }
    }

    fn deliverable(byte: u8) -> BoxedDeliverable {
        Box::new(crate::deliverable::test_support::TestDeliverable::new(
            [byte; PACKET_LEN],
            crate::deliverable::PacketKind::Send,
        ))
    }

    #[tokio::test]
    async fn ipv4_routing_opens_a_connection_and_delivers() {
        let connect_calls = Arc::new(Counter::new(0));
        let calls = Arc::clone(&connect_calls);
        let connect: ConnectFn = Arc::new(move |_key, mut rx| {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                while rx.recv().await.is_some() {}
            })
        });
        let pool = ConnectionPool::new(16, connect);
        let routing = RoutingInfo::ipv4([10, 0, 0, 1], 48099, [1u8; DIGEST_LEN], false);
        pool.send_packets_by_routing(&routing, vec![deliverable(1)], &FakeDns);
        pool.drain();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(connect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn host_routing_resolves_then_opens_a_connection() {
        let connect: ConnectFn = Arc::new(move |_key, mut rx| {
            Box::pin(async move {
                while rx.recv().await.is_some() {}
            })
        });
        let pool = ConnectionPool::new(16, connect);
        let routing = RoutingInfo::host("relay.example", 48099, [2u8; DIGEST_LEN], false);
        pool.send_packets_by_routing(&routing, vec![deliverable(2)], &FakeDns);
        pool.drain();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.active_connection_count(), 1);
    }

    #[tokio::test]
    async fn unresolvable_host_fails_deliverables_retriable() {
        let connect: ConnectFn = Arc::new(move |_key, _rx| Box::pin(async move {}));
        let pool = ConnectionPool::new(16, connect);
        let d = crate::deliverable::test_support::TestDeliverable::new([9u8; PACKET_LEN], crate::deliverable::PacketKind::Send);
        let routing = RoutingInfo::host("nowhere.invalid", 48099, [3u8; DIGEST_LEN], false);
        pool.send_packets_by_routing(&routing, vec![Box::new(d.clone())], &FakeDns);
        pool.drain();
        assert_eq!(d.outcome(), 2);
    }

    #[tokio::test]
    async fn second_batch_to_same_key_reuses_the_connection() {
        let connect_calls = Arc::new(Counter::new(0));
        let calls = Arc::clone(&connect_calls);
        let connect: ConnectFn = Arc::new(move |_key, mut rx| {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                while rx.recv().await.is_some() {}
            })
        });
        let pool = ConnectionPool::new(16, connect);
        let routing = RoutingInfo::ipv4([10, 0, 0, 1], 48099, [4u8; DIGEST_LEN], false);
        pool.send_packets_by_routing(&routing, vec![deliverable(1)], &FakeDns);
        pool.drain();
        pool.send_packets_by_routing(&routing, vec![deliverable(2)], &FakeDns);
        pool.drain();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(connect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn over_capacity_batches_spill_into_pending_until_a_slot_frees() {
        let connect: ConnectFn = Arc::new(move |_key, mut rx| {
            Box::pin(async move {
                // First packet received ends the connection immediately,
                // simulating a short-lived dial that frees its slot fast.
                rx.recv().await;
            })
        });
        let pool = ConnectionPool::new(1, connect);
        let a = RoutingInfo::ipv4([10, 0, 0, 1], 48099, [5u8; DIGEST_LEN], false);
        let b = RoutingInfo::ipv4([10, 0, 0, 2], 48099, [6u8; DIGEST_LEN], false);
        pool.send_packets_by_routing(&a, vec![deliverable(1)], &FakeDns);
        pool.drain();
        pool.send_packets_by_routing(&b, vec![deliverable(2)], &FakeDns);
        pool.drain();
        assert_eq!(pool.pending_batch_count(), 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.drain();
        assert_eq!(pool.pending_batch_count(), 0);
    }
}
