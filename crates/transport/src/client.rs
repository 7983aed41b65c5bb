//! Client side of the MMTP protocol state machine (spec.md §4.5.3-4):
//! dial a peer, negotiate the version line, then stream queued
//! deliverables across the connection one at a time, feeding each
//! outcome back through its [`Deliverable`] callbacks.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use duskrelay_core::collaborators::{EventLog, PingLog};
use duskrelay_core::constants::{DIGEST_LEN, PACKET_LEN};

use crate::deliverable::{BoxedDeliverable, Deliverable, PacketKind};
use crate::error::{Result, TransportError};
use crate::protocol::{self, Ack, Control, ACK_CONTROL_LEN, ACK_LEN, MESSAGE_LEN, SUPPORTED_VERSIONS};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Drive one outbound connection to completion: negotiate, then relay
/// whatever arrives on `inbox` until it closes or the connection fails.
/// Reports `ping_log.connected(keyid)` once the handshake completes and
/// `ping_log.connect_failed(keyid)` if the connection ends without ever
/// completing one. Always drains `inbox` before returning, failing
/// anything left un-acked as retriable — the pool never loses track of
/// a deliverable.
pub async fn dial_and_serve<S>(
    mut stream: S,
    keyid: [u8; DIGEST_LEN],
    mut inbox: mpsc::UnboundedReceiver<BoxedDeliverable>,
    ping_log: Arc<dyn PingLog>,
    event_log: Arc<dyn EventLog>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let result = negotiate_and_serve(&mut stream, keyid, &mut inbox, &ping_log, &event_log).await;
    if result.is_err() {
        ping_log.connect_failed(keyid);
    }
    drain_as_failed(&mut inbox, true);
    result
}

async fn negotiate_and_serve<S>(
    stream: &mut S,
    keyid: [u8; DIGEST_LEN],
    inbox: &mut mpsc::UnboundedReceiver<BoxedDeliverable>,
    ping_log: &Arc<dyn PingLog>,
    event_log: &Arc<dyn EventLog>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    timeout(HANDSHAKE_TIMEOUT, stream.write_all(protocol::offer_line(SUPPORTED_VERSIONS).as_bytes()))
        .await
        .map_err(|_| TransportError::TimedOut)??;

    let line = timeout(HANDSHAKE_TIMEOUT, read_line(stream)).await.map_err(|_| TransportError::TimedOut)??;
    let offered = protocol::parse_offer_line(&line)?;
    if offered.len() != 1 || !SUPPORTED_VERSIONS.contains(&offered[0].as_str()) {
        return Err(TransportError::VersionMismatch);
    }
    tracing::debug!(version = %offered[0], "mmtp client handshake complete");
    ping_log.connected(keyid);

    while let Some(deliverable) = inbox.recv().await {
        let outcome = send_one(stream, deliverable.as_ref()).await;
        match outcome {
            Ok(Ack::Received { .. }) => deliverable.succeeded(),
            Ok(Ack::Rejected) => {
                deliverable.failed(false);
                event_log.count_tagged("FailedDelivery", "rejected");
            }
            Err(e) => {
                deliverable.failed(true);
                return Err(e);
            }
        }
    }
    Ok(())
}

async fn send_one<S>(stream: &mut S, deliverable: &dyn Deliverable) -> Result<Ack>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let control = match deliverable.kind() {
        PacketKind::Send => Control::Send,
        PacketKind::Junk => Control::Junk,
    };
    let packet = deliverable.packet();
    let checksum = protocol::checksum(packet, control.label());

    let mut frame = Vec::with_capacity(MESSAGE_LEN);
    frame.extend_from_slice(control.as_bytes());
    frame.extend_from_slice(packet);
    frame.extend_from_slice(&checksum);
    stream.write_all(&frame).await?;

    let mut ack_buf = [0u8; ACK_LEN];
    stream.read_exact(&mut ack_buf).await?;
    let mut ack_control = [0u8; ACK_CONTROL_LEN];
    ack_control.copy_from_slice(&ack_buf[..ACK_CONTROL_LEN]);
    let mut ack_digest = [0u8; DIGEST_LEN];
    ack_digest.copy_from_slice(&ack_buf[ACK_CONTROL_LEN..]);
    Ok(Ack::parse(&ack_control, &ack_digest, packet)?)
}

async fn read_line<S: AsyncRead + Unpin>(stream: &mut S) -> Result<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).await?;
        line.push(byte[0]);
        if line.ends_with(b"\r\n") {
            break;
        }
        if line.len() > 256 {
            return Err(TransportError::ProtocolViolation("protocol line too long"));
        }
    }
    String::from_utf8(line).map_err(|_| TransportError::ProtocolViolation("protocol line is not UTF-8"))
}

fn drain_as_failed(inbox: &mut mpsc::UnboundedReceiver<BoxedDeliverable>, retriable: bool) {
    while let Ok(d) = inbox.try_recv() {
        d.failed(retriable);
    }
}
