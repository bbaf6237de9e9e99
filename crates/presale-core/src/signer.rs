//! The connected wallet.
//!
//! The core never holds key material. A wallet exposes its public key and
//! signs envelopes it is shown; it may refuse. Implementations are injected
//! per call, which is also how tests substitute a local keypair.

use async_trait::async_trait;
use thiserror::Error;

use crate::envelope::UnsignedEnvelope;
use crate::error::PresaleError;
use crate::types::Address;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("user rejected the request")]
    Rejected,

    #[error("{0}")]
    Failed(String),
}

impl From<SignError> for PresaleError {
    fn from(e: SignError) -> Self {
        match e {
            SignError::Rejected => PresaleError::UserRejected,
            SignError::Failed(msg) => PresaleError::SigningError(msg),
        }
    }
}

#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// The participant's address; it pays fees and receives the tokens.
    fn public_key(&self) -> Address;

    /// Sign `envelope` and return the signed transaction in wire format.
    ///
    /// May wait on the user indefinitely.
    async fn sign_transaction(&self, envelope: &UnsignedEnvelope) -> Result<Vec<u8>, SignError>;
}
