//! Drives a real client and a real server against opposite ends of one
//! duplex stream, exercising the full MMTP handshake and a SEND/ack
//! round trip the way two actual nodes would see it, rather than each
//! side's unit tests faking out the other half of the conversation.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use duskrelay_core::collaborators::{PacketConsumer, TestEventLog, TestPingLog};
use duskrelay_core::constants::{DIGEST_LEN, PACKET_LEN};
use duskrelay_transport::deliverable::{Deliverable, PacketKind};
use duskrelay_transport::server::{serve_connection, RejectMode};
use duskrelay_transport::client;

#[derive(Clone)]
struct RecordingDeliverable {
    packet: [u8; PACKET_LEN],
    kind: PacketKind,
    outcome: Arc<AtomicU8>,
}

impl RecordingDeliverable {
    fn new(packet: [u8; PACKET_LEN], kind: PacketKind) -> Self {
        RecordingDeliverable { packet, kind, outcome: Arc::new(AtomicU8::new(0)) }
    }

    fn outcome(&self) -> u8 {
        self.outcome.load(Ordering::SeqCst)
    }
}

impl Deliverable for RecordingDeliverable {
    fn kind(&self) -> PacketKind {
        self.kind
    }
    fn packet(&self) -> &[u8; PACKET_LEN] {
        &self.packet
    }
    fn succeeded(&self) {
        self.outcome.store(1, Ordering::SeqCst);
    }
    fn failed(&self, retriable: bool) {
        self.outcome.store(if retriable { 2 } else { 3 }, Ordering::SeqCst);
    }
}

struct CountingConsumer(Arc<std::sync::atomic::AtomicUsize>);

impl PacketConsumer for CountingConsumer {
    fn on_packet(&self, _packet: [u8; PACKET_LEN]) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn client_and_server_complete_handshake_and_two_sends() {
    let (client_stream, server_stream) = tokio::io::duplex(1 << 20);

    let received = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let consumer: Arc<dyn PacketConsumer> = Arc::new(CountingConsumer(received.clone()));
    let server_event_log = Arc::new(TestEventLog::new());
    let reject = Arc::new(RejectMode::new(false));
    let server = tokio::spawn(serve_connection(
        server_stream,
        consumer,
        server_event_log.clone(),
        reject,
        std::time::Duration::from_secs(5),
    ));

    let (tx, rx) = mpsc::unbounded_channel();
    let first = RecordingDeliverable::new([1u8; PACKET_LEN], PacketKind::Send);
    let second = RecordingDeliverable::new([2u8; PACKET_LEN], PacketKind::Junk);
    tx.send(Box::new(first.clone()) as duskrelay_transport::BoxedDeliverable).unwrap();
    tx.send(Box::new(second.clone()) as duskrelay_transport::BoxedDeliverable).unwrap();
    drop(tx);

    let ping_log = Arc::new(TestPingLog::new());
    let event_log = Arc::new(TestEventLog::new());
    client::dial_and_serve(client_stream, [4u8; DIGEST_LEN], rx, ping_log.clone(), event_log)
        .await
        .unwrap();

    // The server side returns only once the duplex half closes (clean EOF
    // after the client drops its stream), so it must be awaited after the
    // client side, not raced against it.
    server.await.unwrap().unwrap();

    assert_eq!(first.outcome(), 1);
    assert_eq!(second.outcome(), 1);
    // The junk send never reaches the packet consumer, only the real one does.
    assert_eq!(received.load(Ordering::SeqCst), 1);
    assert_eq!(ping_log.events(), vec![(true, [4u8; DIGEST_LEN])]);
}

#[tokio::test]
async fn reject_mode_acks_received_packets_as_rejected() {
    let (client_stream, server_stream) = tokio::io::duplex(1 << 20);

    let received = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let consumer: Arc<dyn PacketConsumer> = Arc::new(CountingConsumer(received.clone()));
    let server_event_log = Arc::new(TestEventLog::new());
    let reject = Arc::new(RejectMode::new(true));
    let server = tokio::spawn(serve_connection(
        server_stream,
        consumer,
        server_event_log,
        reject,
        std::time::Duration::from_secs(5),
    ));

    let (tx, rx) = mpsc::unbounded_channel();
    let d = RecordingDeliverable::new([3u8; PACKET_LEN], PacketKind::Send);
    tx.send(Box::new(d.clone()) as duskrelay_transport::BoxedDeliverable).unwrap();
    drop(tx);

    let ping_log = Arc::new(TestPingLog::new());
    let event_log = Arc::new(TestEventLog::new());
    client::dial_and_serve(client_stream, [5u8; DIGEST_LEN], rx, ping_log, event_log).await.unwrap();
    server.await.unwrap().unwrap();

    // Rejected delivery is still an ack, not a connection failure, but it
    // is not retriable either: the server saw it and said no.
    assert_eq!(d.outcome(), 3);
    assert_eq!(received.load(Ordering::SeqCst), 0);
}
