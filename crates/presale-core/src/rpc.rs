//! Network connection.
//!
//! The purchase flow needs three RPC calls: a recent blockhash, raw
//! transaction submission, and signature status. [`RpcConnection`] is the
//! seam for injecting a simulated ledger; [`JsonRpcClient`] speaks JSON-RPC
//! 2.0 to a real node over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::types::{Commitment, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecentBlockhash {
    pub blockhash: [u8; 32],
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    /// `None` when the node has seen the transaction but reports no level.
    pub confirmation: Option<Commitment>,
    /// On-chain execution error, as reported by the node.
    pub err: Option<String>,
}

/// `sendTransaction` preflight simulation failed.
pub const PREFLIGHT_FAILURE: i64 = -32002;
/// The node could not verify the transaction's signatures.
pub const SIGNATURE_VERIFICATION_FAILURE: i64 = -32003;
/// The request parameters (the encoded transaction) were rejected.
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("{message}")]
    Rpc {
        code: i64,
        message: String,
        logs: Vec<String>,
    },

    #[error("malformed RPC response: {0}")]
    Malformed(String),
}

/// Whether a `sendTransaction` error code means the node refused the
/// transaction before forwarding it to the cluster.
pub fn rejected_before_forwarding(code: i64) -> bool {
    matches!(code, PREFLIGHT_FAILURE | SIGNATURE_VERIFICATION_FAILURE | INVALID_PARAMS)
}

impl RpcError {
    /// A refusal before forwarding. Any other failure of `sendTransaction`
    /// leaves the outcome open: the node may have forwarded the transaction
    /// before the error.
    pub fn is_definite_rejection(&self) -> bool {
        matches!(self, RpcError::Rpc { code, .. } if rejected_before_forwarding(*code))
    }
}

#[async_trait]
pub trait RpcConnection: Send + Sync {
    async fn latest_blockhash(&self, commitment: Commitment) -> Result<RecentBlockhash, RpcError>;

    /// Submit signed wire bytes with preflight simulation; returns the
    /// signature the node accepted.
    async fn send_raw_transaction(
        &self,
        wire: &[u8],
        preflight: Commitment,
    ) -> Result<TransactionId, RpcError>;

    async fn signature_status(
        &self,
        signature: &TransactionId,
    ) -> Result<Option<SignatureStatus>, RpcError>;
}

/// JSON-RPC 2.0 client over HTTP.
pub struct JsonRpcClient {
    rpc_url: String,
    client: Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(Self {
            rpc_url: rpc_url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.rpc_url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "rpc request");

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout
                } else {
                    RpcError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| RpcError::Transport(e.to_string()))?;
        // Nodes return JSON-RPC errors with non-2xx codes too, so try the body first.
        let parsed: RpcResponse<T> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(RpcError::Transport(format!("HTTP {status}")));
            }
            Err(e) => return Err(RpcError::Malformed(format!("{method}: {e}"))),
        };

        if let Some(error) = parsed.error {
            return Err(error.into());
        }
        parsed
            .result
            .ok_or_else(|| RpcError::Malformed(format!("{method}: response has no result")))
    }
}

#[async_trait]
impl RpcConnection for JsonRpcClient {
    async fn latest_blockhash(&self, commitment: Commitment) -> Result<RecentBlockhash, RpcError> {
        let response: WithContext<BlockhashValue> = self
            .call("getLatestBlockhash", json!([{ "commitment": commitment.as_str() }]))
            .await?;
        response.value.try_into()
    }

    async fn send_raw_transaction(
        &self,
        wire: &[u8],
        preflight: Commitment,
    ) -> Result<TransactionId, RpcError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(wire);
        let signature: String = self
            .call(
                "sendTransaction",
                json!([
                    encoded,
                    {
                        "encoding": "base64",
                        "skipPreflight": false,
                        "preflightCommitment": preflight.as_str(),
                        "maxRetries": 0,
                    }
                ]),
            )
            .await?;
        Ok(TransactionId::from(signature))
    }

    async fn signature_status(
        &self,
        signature: &TransactionId,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let response: WithContext<Vec<Option<StatusValue>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature.as_str()], { "searchTransactionHistory": false }]),
            )
            .await?;
        Ok(response
            .value
            .into_iter()
            .next()
            .flatten()
            .map(SignatureStatus::from))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl From<RpcErrorObject> for RpcError {
    fn from(e: RpcErrorObject) -> Self {
        let logs = e
            .data
            .as_ref()
            .and_then(|d| d.get("logs"))
            .and_then(Value::as_array)
            .map(|logs| {
                logs.iter()
                    .filter_map(|l| l.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        RpcError::Rpc {
            code: e.code,
            message: e.message,
            logs,
        }
    }
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
    last_valid_block_height: u64,
}

impl TryFrom<BlockhashValue> for RecentBlockhash {
    type Error = RpcError;

    fn try_from(v: BlockhashValue) -> Result<Self, Self::Error> {
        // Blockhashes share the 32-byte Base58 encoding of addresses.
        let blockhash = chain_sol::address_to_bytes(&v.blockhash)
            .map_err(|e| RpcError::Malformed(format!("blockhash {:?}: {e}", v.blockhash)))?;
        Ok(Self {
            blockhash,
            last_valid_block_height: v.last_valid_block_height,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusValue {
    slot: u64,
    #[serde(default)]
    confirmations: Option<u64>,
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<Commitment>,
}

impl From<StatusValue> for SignatureStatus {
    fn from(v: StatusValue) -> Self {
        // Old nodes omit confirmationStatus; null confirmations means rooted.
        let confirmation = v.confirmation_status.or(match v.confirmations {
            None => Some(Commitment::Finalized),
            Some(_) => None,
        });
        Self {
            slot: v.slot,
            confirmation,
            err: v.err.filter(|e| !e.is_null()).map(|e| e.to_string()),
        }
    }
}
