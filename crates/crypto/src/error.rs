use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("RSA operation failed: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("key material had unexpected length: expected {expected}, got {got}")]
    BadKeyLength { expected: usize, got: usize },

    #[error("input block length {got} is not a multiple of the LIONESS half-block size")]
    BadLionessBlock { got: usize },
}

pub type Result<T> = std::result::Result<T, CryptoError>;
