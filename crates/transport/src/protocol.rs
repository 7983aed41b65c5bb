//! MMTP wire framing (spec.md §4.5.2): the protocol version line, the
//! fixed-size message frame, and the checksum that binds each frame's
//! control token to its packet bytes. Pure parsing/formatting; no I/O.

use duskrelay_core::constants::{DIGEST_LEN, PACKET_LEN};

use crate::error::{Result, TransportError};

/// Versions this node offers and understands, in preference order.
/// Only "0.3" is defined today (spec.md §4.5.2).
pub const SUPPORTED_VERSIONS: &[&str] = &["0.3"];

/// Length of a client request control line: `"SEND\r\n"` / `"JUNK\r\n"`.
pub const CONTROL_LEN: usize = 6;
/// Length of a server ack control line: `"RECEIVED\r\n"` / `"REJECTED\r\n"`.
pub const ACK_CONTROL_LEN: usize = 10;

/// `control ‖ packet ‖ checksum`, per spec.md §4.5.2.
pub const MESSAGE_LEN: usize = CONTROL_LEN + PACKET_LEN + DIGEST_LEN;
/// Length of a server ack frame: `control ‖ checksum`.
pub const ACK_LEN: usize = ACK_CONTROL_LEN + DIGEST_LEN;

pub const SEND: &[u8; CONTROL_LEN] = b"SEND\r\n";
pub const JUNK: &[u8; CONTROL_LEN] = b"JUNK\r\n";
pub const RECEIVED: &[u8; ACK_CONTROL_LEN] = b"RECEIVED\r\n";
pub const REJECTED: &[u8; ACK_CONTROL_LEN] = b"REJECTED\r\n";

fn sha1_concat(a: &[u8], b: &[u8]) -> [u8; DIGEST_LEN] {
    use sha1::{Digest, Sha1};
    let mut h = Sha1::new();
    h.update(a);
    h.update(b);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&h.finalize());
    out
}

/// `SHA-1(packet ‖ label)`, per spec.md §4.5.2's checksum contract.
pub fn checksum(packet: &[u8; PACKET_LEN], label: &[u8]) -> [u8; DIGEST_LEN] {
    sha1_concat(packet, label)
}

pub fn verify_checksum(packet: &[u8; PACKET_LEN], label: &[u8], claimed: &[u8; DIGEST_LEN]) -> bool {
    checksum(packet, label) == *claimed
}

/// What a sent message's control line meant, i.e. what label its
/// checksum covers it under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Send,
    Junk,
}

impl Control {
    pub fn as_bytes(self) -> &'static [u8; CONTROL_LEN] {
        match self {
            Control::Send => SEND,
            Control::Junk => JUNK,
        }
    }

    pub fn label(self) -> &'static [u8] {
        match self {
            Control::Send => b"SEND",
            Control::Junk => b"JUNK",
        }
    }

    pub fn parse(bytes: &[u8; CONTROL_LEN]) -> Result<Self> {
        if bytes == SEND {
            Ok(Control::Send)
        } else if bytes == JUNK {
            Ok(Control::Junk)
        } else {
            Err(TransportError::ProtocolViolation("unrecognized control line"))
        }
    }
}

/// The server's ack control line for one received message, per
/// spec.md §4.5.2: `RECEIVED` for accepted SEND/JUNK, `REJECTED` when
/// the node is in reject mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Received { was_junk: bool },
    Rejected,
}

impl Ack {
    fn control_bytes(self) -> &'static [u8; ACK_CONTROL_LEN] {
        match self {
            Ack::Received { .. } => RECEIVED,
            Ack::Rejected => REJECTED,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Ack::Received { was_junk: false } => "RECEIVED",
            Ack::Received { was_junk: true } => "RECEIVED JUNK",
            Ack::Rejected => "REJECTED",
        }
    }

    /// Build the full ack frame for `packet`: control line plus
    /// `SHA-1(packet ‖ label)`.
    pub fn frame(self, packet: &[u8; PACKET_LEN]) -> Vec<u8> {
        let mut out = Vec::with_capacity(ACK_LEN);
        out.extend_from_slice(self.control_bytes());
        out.extend_from_slice(&sha1_concat(packet, self.label().as_bytes()));
        out
    }

    pub fn parse(control: &[u8; ACK_CONTROL_LEN], digest: &[u8; DIGEST_LEN], packet: &[u8; PACKET_LEN]) -> Result<Self> {
        if control == RECEIVED {
            for was_junk in [false, true] {
                let ack = Ack::Received { was_junk };
                if sha1_concat(packet, ack.label().as_bytes()) == *digest {
                    return Ok(ack);
                }
            }
            Err(TransportError::BadChecksum)
        } else if control == REJECTED {
            if sha1_concat(packet, "REJECTED".as_bytes()) == *digest {
                Ok(Ack::Rejected)
            } else {
                Err(TransportError::BadChecksum)
            }
        } else {
            Err(TransportError::ProtocolViolation("unrecognized ack control line"))
        }
    }
}

/// Render the client's opening protocol line: `MMTP <v1,v2,...>\r\n`.
pub fn offer_line(versions: &[&str]) -> String {
    format!("MMTP {}\r\n", versions.join(","))
}

/// Parse a peer's `MMTP <versions>\r\n` line and return the versions it
/// offered, in order.
pub fn parse_offer_line(line: &str) -> Result<Vec<String>> {
    let line = line.trim_end_matches("\r\n").trim_end_matches('\n');
    let rest = line
        .strip_prefix("MMTP ")
        .ok_or(TransportError::ProtocolViolation("missing MMTP prefix"))?;
    if rest.is_empty() {
        return Err(TransportError::ProtocolViolation("no versions offered"));
    }
    Ok(rest.split(',').map(|s| s.trim().to_string()).collect())
}

/// The first version we support that also appears in `offered`, per
/// spec.md §4.5.2 ("the first supported version it offers").
pub fn negotiate(offered: &[String]) -> Option<&'static str> {
    SUPPORTED_VERSIONS.iter().copied().find(|v| offered.iter().any(|o| o == v))
}
