//! Transaction envelopes before and after the wallet signs them.

use std::time::Duration;

use base64::Engine;
use chain_sol::{SignedTransaction, SolInstruction, SolTransaction};
use tracing::{debug, warn};

use crate::error::PresaleError;
use crate::rpc::RpcConnection;
use crate::types::{Address, Commitment, TransactionId};

/// A compiled message with a fresh blockhash, ready for the wallet.
#[derive(Debug, Clone)]
pub struct UnsignedEnvelope {
    pub transaction: SolTransaction,
    /// Serialized message: the exact bytes the fee payer signs.
    pub message: Vec<u8>,
    /// The blockhash stops being accepted after this block height.
    pub last_valid_block_height: u64,
}

impl UnsignedEnvelope {
    pub fn new(transaction: SolTransaction, last_valid_block_height: u64) -> Result<Self, PresaleError> {
        let message = chain_sol::serialize_message(&transaction)?;
        Ok(Self {
            transaction,
            message,
            last_valid_block_height,
        })
    }

    pub fn fee_payer(&self) -> Option<Address> {
        self.transaction.fee_payer().copied().map(Address::new_from_array)
    }

    pub fn recent_blockhash(&self) -> [u8; 32] {
        self.transaction.recent_blockhash
    }

    /// Wire bytes with zeroed signature slots.
    pub fn unsigned_wire(&self) -> Vec<u8> {
        chain_sol::unsigned_wire(self.transaction.num_required_signatures, &self.message)
    }

    /// Base64 unsigned wire bytes, the form browser wallets deserialize.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.unsigned_wire())
    }
}

/// Fetch a recent blockhash and compile `instructions` with `fee_payer`.
///
/// Must run immediately before signing: the blockhash expires within
/// roughly a minute.
pub async fn assemble(
    instructions: &[SolInstruction],
    fee_payer: &Address,
    connection: &dyn RpcConnection,
    commitment: Commitment,
    timeout: Duration,
) -> Result<UnsignedEnvelope, PresaleError> {
    let recent = tokio::time::timeout(timeout, connection.latest_blockhash(commitment))
        .await
        .map_err(|_| {
            PresaleError::NetworkUnavailable(format!(
                "timed out fetching a recent blockhash after {} ms",
                timeout.as_millis()
            ))
        })?
        .map_err(|e| PresaleError::NetworkUnavailable(format!("fetching a recent blockhash: {e}")))?;

    debug!(
        blockhash = %chain_sol::bytes_to_address(&recent.blockhash),
        last_valid_block_height = recent.last_valid_block_height,
        "fetched recent blockhash"
    );

    let transaction =
        chain_sol::compile_transaction(instructions, fee_payer.as_bytes(), &recent.blockhash)?;
    UnsignedEnvelope::new(transaction, recent.last_valid_block_height)
}

/// A wallet-signed transaction that has been checked locally.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    transaction: SignedTransaction,
    id: TransactionId,
}

impl SignedEnvelope {
    /// Parse and verify the wallet's output for `envelope`.
    ///
    /// The fee payer must be unchanged and every signature must verify. A
    /// wallet may rewrite the message (priority fees, for example); that is
    /// accepted as long as the signatures cover what it returned.
    pub fn from_wallet(envelope: &UnsignedEnvelope, wire: &[u8]) -> Result<Self, PresaleError> {
        let transaction = SignedTransaction::from_wire(wire).map_err(|e| {
            PresaleError::SigningError(format!("wallet returned an unusable transaction: {e}"))
        })?;

        let expected_payer = envelope.transaction.fee_payer();
        if transaction.signers.first() != expected_payer {
            return Err(PresaleError::SigningError(
                "wallet signed for a different fee payer".into(),
            ));
        }
        transaction.verify().map_err(|e| {
            PresaleError::SigningError(format!("wallet signature does not verify: {e}"))
        })?;

        if transaction.message != envelope.message {
            warn!("wallet modified the transaction message before signing");
        }

        let id = TransactionId::from_signature(transaction.fee_payer_signature());
        Ok(Self { transaction, id })
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn wire(&self) -> Vec<u8> {
        self.transaction.to_wire()
    }
}
