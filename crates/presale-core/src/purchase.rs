//! End-to-end purchase orchestration.
//!
//! `Presale` holds configuration only. Everything that belongs to a single
//! purchase lives in a [`PurchaseAttempt`], so concurrent purchases through
//! one `Presale` never observe each other.

use std::fmt;
use std::sync::Arc;

use chain_sol::SolInstruction;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::addresses::{self, DerivedAddresses};
use crate::amount::Lamports;
use crate::broadcast::{self, ConfirmOptions};
use crate::config::PresaleConfig;
use crate::envelope::{self, SignedEnvelope, UnsignedEnvelope};
use crate::error::PresaleError;
use crate::instruction::{self, ProgramAddresses};
use crate::rpc::RpcConnection;
use crate::signer::WalletSigner;
use crate::types::{Address, ConfirmationResult, TransactionId};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Pending,
    /// Built and awaiting the wallet's signature. A wallet refusal stops here.
    Built,
    /// Signed and verified, not yet sent.
    Signed,
    /// Sent, or possibly sent when the node did not acknowledge it.
    Submitted,
    Confirmed,
    Rejected,
    TimedOut,
}

impl Stage {
    /// Whether `next` directly follows `self`. No stage may be skipped.
    pub fn can_advance_to(self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Stage::Pending, Stage::Built)
                | (Stage::Built, Stage::Signed)
                | (Stage::Signed, Stage::Submitted)
                | (Stage::Submitted, Stage::Confirmed)
                | (Stage::Submitted, Stage::Rejected)
                | (Stage::Submitted, Stage::TimedOut)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Confirmed | Stage::Rejected | Stage::TimedOut)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Pending => "pending",
            Stage::Built => "built",
            Stage::Signed => "signed",
            Stage::Submitted => "submitted",
            Stage::Confirmed => "confirmed",
            Stage::Rejected => "rejected",
            Stage::TimedOut => "timed-out",
        };
        f.write_str(name)
    }
}

/// Progress of one purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseAttempt {
    stage: Stage,
    signature: Option<TransactionId>,
}

impl Default for PurchaseAttempt {
    fn default() -> Self {
        Self::new()
    }
}

impl PurchaseAttempt {
    pub fn new() -> Self {
        Self {
            stage: Stage::Pending,
            signature: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Known once the wallet has signed.
    pub fn signature(&self) -> Option<&TransactionId> {
        self.signature.as_ref()
    }

    pub fn advance(&mut self, next: Stage) -> Result<(), PresaleError> {
        if !self.stage.can_advance_to(next) {
            return Err(PresaleError::Internal(format!(
                "invalid stage transition {} -> {}",
                self.stage, next
            )));
        }
        info!(from = %self.stage, to = %next, "purchase stage");
        self.stage = next;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cancels the purchase bound to the paired [`CancelToken`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx: Some(rx) })
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancelled. Pends forever if the handle was dropped
    /// without cancelling.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Presale
// ---------------------------------------------------------------------------

struct Inner {
    config: PresaleConfig,
    programs: ProgramAddresses,
    authority: Address,
}

/// Entry point for purchases. Cheap to clone and safe to share.
#[derive(Clone)]
pub struct Presale {
    inner: Arc<Inner>,
}

impl fmt::Debug for Presale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Presale")
            .field("program_id", &self.inner.programs.program_id)
            .field("mint", &self.inner.programs.mint)
            .finish()
    }
}

impl Presale {
    /// Validate `config` and derive the program authority once.
    pub fn new(config: PresaleConfig) -> Result<Self, PresaleError> {
        config.validate()?;
        let programs = ProgramAddresses::from(&config);
        let authority = addresses::derive_authority(&programs.program_id)?;
        debug!(program = %programs.program_id, %authority, "presale ready");
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                programs,
                authority,
            }),
        })
    }

    pub fn config(&self) -> &PresaleConfig {
        &self.inner.config
    }

    pub fn mint_authority(&self) -> Address {
        self.inner.authority
    }

    /// Validate and scale a raw amount without touching the network.
    pub fn quote(&self, raw: &str) -> Result<Lamports, PresaleError> {
        self.inner.config.amount.validate(raw)
    }

    pub fn derive_addresses(&self, owner: &Address) -> Result<DerivedAddresses, PresaleError> {
        let programs = &self.inner.programs;
        let holding = addresses::derive_holding(
            &programs.mint,
            owner,
            &programs.token_program,
            &programs.associated_token_program,
        )?;
        Ok(DerivedAddresses {
            holding,
            authority: self.inner.authority,
        })
    }

    pub fn build_instruction(
        &self,
        owner: &Address,
        lamports: Lamports,
    ) -> Result<SolInstruction, PresaleError> {
        let derived = self.derive_addresses(owner)?;
        Ok(instruction::build_purchase_instruction(
            owner,
            lamports,
            &derived,
            &self.inner.programs,
        ))
    }

    /// Validate, build and attach a fresh blockhash for `owner`.
    pub async fn prepare(
        &self,
        connection: &dyn RpcConnection,
        owner: &Address,
        raw_amount: &str,
    ) -> Result<UnsignedEnvelope, PresaleError> {
        let lamports = self.quote(raw_amount)?;
        let ix = self.build_instruction(owner, lamports)?;
        self.assemble(&ix, owner, connection).await
    }

    /// Run a purchase to confirmation and return its signature.
    pub async fn purchase(
        &self,
        connection: &dyn RpcConnection,
        signer: &dyn WalletSigner,
        raw_amount: &str,
    ) -> Result<TransactionId, PresaleError> {
        self.purchase_with_cancel(connection, signer, raw_amount, CancelToken::never())
            .await
    }

    pub async fn purchase_with_cancel(
        &self,
        connection: &dyn RpcConnection,
        signer: &dyn WalletSigner,
        raw_amount: &str,
        cancel: CancelToken,
    ) -> Result<TransactionId, PresaleError> {
        let mut attempt = PurchaseAttempt::new();
        self.run(&mut attempt, connection, signer, raw_amount, &cancel)
            .await
            .map(|result| result.signature)
    }

    /// Drive `attempt` through every stage.
    ///
    /// Cancelling before the transaction is submitted returns `Cancelled`
    /// with nothing sent. Cancelling afterwards only stops the wait and
    /// returns `Abandoned` with the signature.
    pub async fn run(
        &self,
        attempt: &mut PurchaseAttempt,
        connection: &dyn RpcConnection,
        signer: &dyn WalletSigner,
        raw_amount: &str,
        cancel: &CancelToken,
    ) -> Result<ConfirmationResult, PresaleError> {
        if attempt.stage() != Stage::Pending {
            return Err(PresaleError::Internal(format!(
                "purchase attempt already {}",
                attempt.stage()
            )));
        }

        let lamports = self.quote(raw_amount)?;
        let owner = signer.public_key();
        let ix = self.build_instruction(&owner, lamports)?;
        info!(%owner, amount = %lamports, "starting purchase");

        if cancel.is_cancelled() {
            return Err(PresaleError::Cancelled);
        }
        let unsigned = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PresaleError::Cancelled),
            built = self.assemble(&ix, &owner, connection) => built?,
        };
        attempt.advance(Stage::Built)?;

        let wire = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PresaleError::Cancelled),
            wire = signer.sign_transaction(&unsigned) => wire?,
        };
        let signed = SignedEnvelope::from_wallet(&unsigned, &wire)?;
        attempt.signature = Some(signed.id().clone());
        attempt.advance(Stage::Signed)?;

        if cancel.is_cancelled() {
            return Err(PresaleError::Cancelled);
        }

        attempt.advance(Stage::Submitted)?;
        let network = &self.inner.config.network;
        let id = match broadcast::submit(&signed, connection, network.preflight_commitment).await {
            Ok(id) => id,
            Err(e @ PresaleError::SubmissionRejected { .. }) => {
                attempt.advance(Stage::Rejected)?;
                return Err(e);
            }
            // Unacknowledged: the attempt stays Submitted.
            Err(e) => return Err(e),
        };

        let options = ConfirmOptions {
            commitment: network.commitment,
            timeout: network.confirm_timeout(),
            poll_interval: network.poll_interval(),
        };
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(signature = %id, "stopped waiting for confirmation");
                return Err(PresaleError::Abandoned { signature: id });
            }
            outcome = broadcast::confirm(&id, connection, options) => outcome,
        };

        match outcome {
            Ok(result) => {
                attempt.advance(Stage::Confirmed)?;
                Ok(result)
            }
            Err(e @ PresaleError::ConfirmationTimeout { .. }) => {
                attempt.advance(Stage::TimedOut)?;
                Err(e)
            }
            Err(e @ PresaleError::SubmissionRejected { .. }) => {
                attempt.advance(Stage::Rejected)?;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn assemble(
        &self,
        ix: &SolInstruction,
        owner: &Address,
        connection: &dyn RpcConnection,
    ) -> Result<UnsignedEnvelope, PresaleError> {
        let network = &self.inner.config.network;
        envelope::assemble(
            std::slice::from_ref(ix),
            owner,
            connection,
            network.preflight_commitment,
            network.rpc_timeout(),
        )
        .await
    }
}
