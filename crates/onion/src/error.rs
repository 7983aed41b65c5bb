use thiserror::Error;

#[derive(Debug, Error)]
pub enum OnionError {
    #[error("path must contain at least one hop")]
    EmptyPath,

    #[error("{leg} leg's routing info does not fit in a header")]
    PathTooLong { leg: &'static str },

    #[error(transparent)]
    Crypto(#[from] duskrelay_crypto::CryptoError),

    #[error(transparent)]
    Core(#[from] duskrelay_core::CoreError),

    #[error("payload is not well-formed: {0}")]
    MalformedPayload(&'static str),

    #[error("payload hash does not match its contents")]
    CorruptPayload,
}

pub type Result<T> = std::result::Result<T, OnionError>;

impl From<OnionError> for duskrelay_core::CoreError {
    fn from(e: OnionError) -> Self {
        match e {
            OnionError::EmptyPath => duskrelay_core::CoreError::EmptyPath,
            OnionError::PathTooLong { leg } => duskrelay_core::CoreError::PathTooLong { leg },
            OnionError::CorruptPayload => duskrelay_core::CoreError::CorruptPayload,
            OnionError::MalformedPayload(m) => duskrelay_core::CoreError::MalformedPayload(m),
            // a header that turned out too big during construction is, to
            // the caller, indistinguishable from a path that was too long.
            OnionError::Crypto(_) | OnionError::Core(_) => {
                duskrelay_core::CoreError::PathTooLong { leg: "unknown" }
            }
        }
    }
}
