use thiserror::Error;

/// Solana primitive errors.
#[derive(Debug, Error)]
pub enum SolError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("address derivation error: {0}")]
    DerivationError(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signature error: {0}")]
    SignatureError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}
