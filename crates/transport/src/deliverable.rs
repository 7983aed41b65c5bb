//! The outbound side's view of a packet waiting to go out: the bytes
//! to send and the callbacks the sender wants invoked once we know
//! whether delivery succeeded. Mirrors the `DeliverableMessage`
//! interface the original server calls back into (spec.md §4.5.3).

use duskrelay_core::constants::PACKET_LEN;

/// Whether a queued frame is a real packet (`SEND`) or cover traffic
/// (`JUNK`). Junk deliverables still get a success/failure callback so
/// the padding scheduler above this crate can account for them, but in
/// practice nothing calls `failed` on link padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Send,
    Junk,
}

/// A single packet queued for delivery to one destination, plus the
/// outcome callbacks spec.md §4.5.3 requires:
///
/// - connect failure or a mid-stream connection drop before this
///   packet's ack → `failed(true)` (retriable);
/// - a `REJECTED` ack → `failed(false)` (not retriable);
/// - a `RECEIVED` ack → `succeeded()`.
pub trait Deliverable: Send {
    fn kind(&self) -> PacketKind;
    fn packet(&self) -> &[u8; PACKET_LEN];
    fn succeeded(&self);
    fn failed(&self, retriable: bool);
}

/// A boxed deliverable, the shape the connection pool actually queues.
pub type BoxedDeliverable = Box<dyn Deliverable>;
