//! Server side of the MMTP protocol state machine (spec.md §4.5.2):
//! `AwaitingTLSHandshake → AwaitingProtocolLine → WritingProtocolAck →
//! AwaitingMessage ↔ WritingAck → Closed`. The TLS handshake itself
//! happens before this function is called (see [`crate::tls`]); this
//! covers everything from the protocol line onward.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, Duration};

use duskrelay_core::collaborators::{EventLog, PacketConsumer};
use duskrelay_core::constants::{DIGEST_LEN, PACKET_LEN};

use crate::error::{Result, TransportError};
use crate::protocol::{self, Ack, Control, MESSAGE_LEN, SUPPORTED_VERSIONS};

/// Node-wide switch a directory or operator can flip to have this node
/// reject every message while keeping connections alive, per spec.md
/// §4.5.2's `REJECTED` ack. Shared across all connections.
#[derive(Default)]
pub struct RejectMode(AtomicBool);

impl RejectMode {
    pub fn new(rejecting: bool) -> Self {
        RejectMode(AtomicBool::new(rejecting))
    }

    pub fn is_rejecting(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, rejecting: bool) {
        self.0.store(rejecting, Ordering::Relaxed);
    }
}

/// Serve one already-TLS-accepted connection until it closes or a
/// protocol violation ends it. Never panics on malformed input; every
/// failure path returns a [`TransportError`] and lets the caller close
/// the socket.
pub async fn serve_connection<S>(
    mut stream: S,
    consumer: Arc<dyn PacketConsumer>,
    event_log: Arc<dyn EventLog>,
    reject: Arc<RejectMode>,
    idle_timeout: Duration,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    event_log.count("ReceivedConnection");

    let line = timeout(idle_timeout, read_line(&mut stream)).await.map_err(|_| TransportError::TimedOut)??;
    let offered = protocol::parse_offer_line(&line)?;
    let version = protocol::negotiate(&offered).ok_or(TransportError::VersionMismatch)?;
    timeout(idle_timeout, stream.write_all(protocol::offer_line(&[version]).as_bytes()))
        .await
        .map_err(|_| TransportError::TimedOut)??;
    tracing::debug!(version, "mmtp server handshake complete");

    loop {
        let mut frame = vec![0u8; MESSAGE_LEN];
        match timeout(idle_timeout, stream.read_exact(&mut frame)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) if is_clean_eof(&e) => return Ok(()),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Ok(()),
        }

        let mut control = [0u8; protocol::CONTROL_LEN];
        control.copy_from_slice(&frame[..protocol::CONTROL_LEN]);
        let control = Control::parse(&control)?;

        let mut packet = [0u8; PACKET_LEN];
        packet.copy_from_slice(&frame[protocol::CONTROL_LEN..protocol::CONTROL_LEN + PACKET_LEN]);

        let mut checksum = [0u8; DIGEST_LEN];
        checksum.copy_from_slice(&frame[protocol::CONTROL_LEN + PACKET_LEN..]);
        if !protocol::verify_checksum(&packet, control.label(), &checksum) {
            return Err(TransportError::BadChecksum);
        }

        let was_junk = matches!(control, Control::Junk);
        let ack = if reject.is_rejecting() {
            event_log.count_tagged("FailedDelivery", "rejected");
            Ack::Rejected
        } else {
            if !was_junk {
                consumer.on_packet(packet);
            }
            event_log.count("ReceivedPacket");
            Ack::Received { was_junk }
        };

        timeout(idle_timeout, stream.write_all(&ack.frame(&packet))).await.map_err(|_| TransportError::TimedOut)??;
    }
}

fn is_clean_eof(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::UnexpectedEof
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
