use thiserror::Error;

/// Connection-local failures. Per spec.md §7 these never propagate to
/// the reactor: a connection that hits one of these just closes, and
/// the reactor only ever observes the resulting state-flag change.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bad MMTP line or control token: {0}")]
    ProtocolViolation(&'static str),

    #[error("checksum did not match the bytes it was supposed to cover")]
    BadChecksum,

    #[error("peer offered no protocol version we support")]
    VersionMismatch,

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("certificate error: {0}")]
    Cert(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection idle past the configured timeout")]
    TimedOut,
}

pub type Result<T> = std::result::Result<T, TransportError>;
