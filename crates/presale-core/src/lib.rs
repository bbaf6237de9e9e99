//! Presale purchase pipeline.
//!
//! Turns a user-entered SOL amount into a signed, submitted and confirmed
//! `purchase_tokens` transaction:
//!
//! raw amount -> lamports -> instruction -> unsigned envelope -> wallet
//! signature -> broadcast -> confirmation.
//!
//! The crate never holds private keys. Signing is delegated to a
//! [`WalletSigner`] and network access to an [`RpcConnection`], both injected
//! per call.

pub mod addresses;
pub mod amount;
pub mod broadcast;
pub mod config;
pub mod envelope;
pub mod error;
pub mod instruction;
pub mod purchase;
pub mod rpc;
pub mod signer;
pub mod types;

pub use addresses::DerivedAddresses;
pub use amount::{AmountPolicy, Lamports, LAMPORTS_PER_SOL};
pub use broadcast::ConfirmOptions;
pub use config::{NetworkConfig, PresaleConfig};
pub use envelope::{SignedEnvelope, UnsignedEnvelope};
pub use error::PresaleError;
pub use instruction::{ProgramAddresses, PURCHASE_ACCOUNTS};
pub use purchase::{cancel_pair, CancelHandle, CancelToken, Presale, PurchaseAttempt, Stage};
pub use rpc::{JsonRpcClient, RecentBlockhash, RpcConnection, RpcError, SignatureStatus};
pub use signer::{SignError, WalletSigner};
pub use types::{Address, Commitment, ConfirmationResult, TransactionId};
