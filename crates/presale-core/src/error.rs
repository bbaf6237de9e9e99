use chain_sol::SolError;
use thiserror::Error;

use crate::types::{Commitment, TransactionId};

#[derive(Debug, Error)]
pub enum PresaleError {
    #[error("Invalid amount {input:?}: {reason}")]
    InvalidFormat { input: String, reason: String },

    #[error("Amount {input} is out of range: enter between {min} and {max} SOL")]
    OutOfRange {
        input: String,
        min: String,
        max: String,
    },

    #[error("Address derivation failed: {0}")]
    DerivationError(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Transaction rejected by the network: {reason}")]
    SubmissionRejected { reason: String, logs: Vec<String> },

    #[error(
        "Transaction {signature} may have been sent, but the node did not acknowledge it ({reason}). \
         It may still complete: check its status before trying again"
    )]
    SubmissionUnknown {
        signature: TransactionId,
        reason: String,
    },

    #[error("Transaction was rejected in the wallet")]
    UserRejected,

    #[error("Signing failed: {0}")]
    SigningError(String),

    #[error(
        "Transaction {signature} was not {commitment} after {waited_ms} ms. \
         It may still complete: check its status before trying again"
    )]
    ConfirmationTimeout {
        signature: TransactionId,
        commitment: Commitment,
        waited_ms: u64,
    },

    #[error("Purchase cancelled before anything was submitted")]
    Cancelled,

    #[error(
        "Stopped waiting for transaction {signature}. \
         It was already submitted and may still complete"
    )]
    Abandoned { signature: TransactionId },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PresaleError {
    /// The user declined in the wallet; callers usually show nothing.
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, PresaleError::UserRejected)
    }

    /// Rejected before any network call; safe to correct and resubmit.
    pub fn is_retryable_input(&self) -> bool {
        matches!(
            self,
            PresaleError::InvalidFormat { .. } | PresaleError::OutOfRange { .. }
        )
    }

    /// The transaction was broadcast but its fate is unknown.
    pub fn outcome_unknown(&self) -> bool {
        matches!(
            self,
            PresaleError::SubmissionUnknown { .. }
                | PresaleError::ConfirmationTimeout { .. }
                | PresaleError::Abandoned { .. }
        )
    }

    /// Signature of the submitted transaction, when there is one.
    pub fn signature(&self) -> Option<&TransactionId> {
        match self {
            PresaleError::SubmissionUnknown { signature, .. }
            | PresaleError::ConfirmationTimeout { signature, .. }
            | PresaleError::Abandoned { signature } => Some(signature),
            _ => None,
        }
    }
}

impl From<SolError> for PresaleError {
    fn from(e: SolError) -> Self {
        match e {
            SolError::DerivationError(msg) => PresaleError::DerivationError(msg),
            SolError::SignatureError(_) | SolError::InvalidPublicKey(_) => {
                PresaleError::SigningError(e.to_string())
            }
            SolError::InvalidAddress(_) => PresaleError::Config(e.to_string()),
            SolError::TransactionBuildError(_) | SolError::SerializationError(_) => {
                PresaleError::Internal(e.to_string())
            }
        }
    }
}
