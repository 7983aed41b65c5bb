use thiserror::Error;

/// Errors raised by the packet codec and shared across the onion and
/// transport layers.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("payload is not well-formed: {0}")]
    MalformedPayload(&'static str),

    #[error("payload hash does not match its contents")]
    CorruptPayload,

    #[error("routing info for {leg} leg does not fit in a header")]
    PathTooLong { leg: &'static str },

    #[error("path must contain at least one hop")]
    EmptyPath,

    #[error("header has no room left for this hop's routing info")]
    HeaderTooBig,
}

pub type Result<T> = std::result::Result<T, CoreError>;
