//! Submission and confirmation.
//!
//! Both steps are single-shot. A submitted transaction is never resent: if
//! confirmation times out it may still land, and a second copy would look
//! like a double charge to the buyer.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::envelope::SignedEnvelope;
use crate::error::PresaleError;
use crate::rpc::{self, RpcConnection, RpcError};
use crate::types::{Commitment, ConfirmationResult, TransactionId};

#[derive(Debug, Clone, Copy)]
pub struct ConfirmOptions {
    pub commitment: Commitment,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

/// Broadcast with preflight simulation.
///
/// Only a refusal the node reports before forwarding is a rejection. Any
/// other failure may hide a forwarded transaction and comes back as
/// `SubmissionUnknown` carrying the signature.
pub async fn submit(
    signed: &SignedEnvelope,
    connection: &dyn RpcConnection,
    preflight: Commitment,
) -> Result<TransactionId, PresaleError> {
    let id = signed.id().clone();

    match connection.send_raw_transaction(&signed.wire(), preflight).await {
        Ok(accepted) => {
            if accepted != id {
                warn!(local = %id, node = %accepted, "node reported a different signature");
            }
            info!(signature = %id, "transaction submitted");
            Ok(id)
        }
        Err(RpcError::Rpc { code, message, logs }) if rpc::rejected_before_forwarding(code) => {
            warn!(signature = %id, reason = %message, "transaction rejected by preflight");
            Err(PresaleError::SubmissionRejected {
                reason: message,
                logs,
            })
        }
        Err(e) => {
            warn!(signature = %id, error = %e, "submission outcome unknown");
            Err(PresaleError::SubmissionUnknown {
                signature: id,
                reason: e.to_string(),
            })
        }
    }
}

/// Poll until `id` reaches `options.commitment` or the timeout elapses.
pub async fn confirm(
    id: &TransactionId,
    connection: &dyn RpcConnection,
    options: ConfirmOptions,
) -> Result<ConfirmationResult, PresaleError> {
    let started = Instant::now();
    match tokio::time::timeout(options.timeout, poll_status(id, connection, options)).await {
        Ok(result) => result,
        Err(_) => {
            let waited_ms = started.elapsed().as_millis() as u64;
            warn!(signature = %id, waited_ms, "confirmation timed out");
            Err(PresaleError::ConfirmationTimeout {
                signature: id.clone(),
                commitment: options.commitment,
                waited_ms,
            })
        }
    }
}

async fn poll_status(
    id: &TransactionId,
    connection: &dyn RpcConnection,
    options: ConfirmOptions,
) -> Result<ConfirmationResult, PresaleError> {
    let mut polls = 0u32;
    loop {
        polls += 1;
        match connection.signature_status(id).await {
            Ok(Some(status)) => {
                if let Some(err) = status.err {
                    warn!(signature = %id, slot = status.slot, %err, "transaction failed on-chain");
                    return Err(PresaleError::SubmissionRejected {
                        reason: format!("transaction {id} failed on-chain: {err}"),
                        logs: Vec::new(),
                    });
                }
                if let Some(level) = status.confirmation {
                    if level.satisfies(options.commitment) {
                        info!(signature = %id, %level, slot = status.slot, polls, "transaction confirmed");
                        return Ok(ConfirmationResult {
                            signature: id.clone(),
                            commitment: level,
                            slot: Some(status.slot),
                        });
                    }
                }
                debug!(signature = %id, confirmation = ?status.confirmation, "waiting for commitment");
            }
            Ok(None) => debug!(signature = %id, polls, "transaction not seen yet"),
            // A failed poll says nothing about the transaction; keep waiting.
            Err(e) => warn!(signature = %id, error = %e, "status poll failed"),
        }
        tokio::time::sleep(options.poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{RecentBlockhash, SignatureStatus};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a fixed sequence of status responses, then repeats the last.
    struct ScriptedStatus {
        script: Mutex<Vec<Result<Option<SignatureStatus>, RpcError>>>,
        polls: Mutex<u32>,
    }

    impl ScriptedStatus {
        fn new(mut script: Vec<Result<Option<SignatureStatus>, RpcError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                polls: Mutex::new(0),
            }
        }

        fn polls(&self) -> u32 {
            *self.polls.lock().unwrap()
        }
    }

    fn status(level: Option<Commitment>, err: Option<&str>) -> Result<Option<SignatureStatus>, RpcError> {
        Ok(Some(SignatureStatus {
            slot: 42,
            confirmation: level,
            err: err.map(str::to_string),
        }))
    }

    #[async_trait]
    impl RpcConnection for ScriptedStatus {
        async fn latest_blockhash(&self, _: Commitment) -> Result<RecentBlockhash, RpcError> {
            Err(RpcError::Transport("unused".into()))
        }

        async fn send_raw_transaction(&self, _: &[u8], _: Commitment) -> Result<TransactionId, RpcError> {
            Err(RpcError::Transport("unused".into()))
        }

        async fn signature_status(&self, _: &TransactionId) -> Result<Option<SignatureStatus>, RpcError> {
            *self.polls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop().unwrap()
            } else {
                match script.last().unwrap() {
                    Ok(s) => Ok(s.clone()),
                    Err(_) => Err(RpcError::Timeout),
                }
            }
        }
    }

    fn options(commitment: Commitment) -> ConfirmOptions {
        ConfirmOptions {
            commitment,
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
        }
    }

    fn id() -> TransactionId {
        TransactionId::from("5sig".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn waits_through_weaker_levels() {
        let ledger = ScriptedStatus::new(vec![
            Ok(None),
            status(Some(Commitment::Processed), None),
            Err(RpcError::Transport("connection reset".into())),
            status(Some(Commitment::Confirmed), None),
        ]);

        let result = confirm(&id(), &ledger, options(Commitment::Confirmed)).await.unwrap();
        assert_eq!(result.commitment, Commitment::Confirmed);
        assert_eq!(result.slot, Some(42));
        assert_eq!(ledger.polls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn stronger_level_satisfies_request() {
        let ledger = ScriptedStatus::new(vec![status(Some(Commitment::Finalized), None)]);
        let result = confirm(&id(), &ledger, options(Commitment::Processed)).await.unwrap();
        assert_eq!(result.commitment, Commitment::Finalized);
        assert_eq!(ledger.polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn on_chain_failure_is_terminal() {
        let ledger = ScriptedStatus::new(vec![status(
            Some(Commitment::Processed),
            Some(r#"{"InstructionError":[0,{"Custom":6000}]}"#),
        )]);
        let err = confirm(&id(), &ledger, options(Commitment::Processed)).await.unwrap_err();
        assert!(matches!(err, PresaleError::SubmissionRejected { ref reason, .. } if reason.contains("Custom")));
        assert_eq!(ledger.polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn never_seen_times_out_with_signature() {
        let ledger = ScriptedStatus::new(vec![Ok(None)]);
        let err = confirm(&id(), &ledger, options(Commitment::Confirmed)).await.unwrap_err();

        match err {
            PresaleError::ConfirmationTimeout { signature, commitment, waited_ms } => {
                assert_eq!(signature, id());
                assert_eq!(commitment, Commitment::Confirmed);
                assert!(waited_ms >= 30_000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Polls every 500 ms across the 30 s window.
        assert!(ledger.polls() >= 60);
    }
}
