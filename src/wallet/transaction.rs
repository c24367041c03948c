use alloy::primitives::TxHash;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::{
    chain::ChainClient,
    config::Config,
    types::{PreparedTransaction, TransactionOutcome, TxContext, TxStatus},
    utils::{explorer_link, format_gwei},
};

/// Sends prepared transactions and waits, with a bound, for their receipts.
#[derive(Debug, Clone)]
pub struct TransactionSubmitter {
    explorer_tx_url: String,
    confirmation_timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl TransactionSubmitter {
    pub fn new(config: &Config) -> Self {
        Self {
            explorer_tx_url: config.explorer_tx_url.clone(),
            confirmation_timeout: config.confirmation_timeout,
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// Sends `tx` and waits for inclusion.
    ///
    /// The send itself is never retried: a second broadcast could land twice.
    pub async fn submit(
        &self,
        client: &dyn ChainClient,
        tx: PreparedTransaction,
    ) -> TransactionOutcome {
        let start = tokio::time::Instant::now();

        info!(
            to = %tx.to,
            gas_limit = tx.gas_limit,
            max_fee_gwei = %format_gwei(tx.fees.max_fee_per_gas),
            priority_fee_gwei = %format_gwei(tx.fees.max_priority_fee_per_gas),
            "Sending transaction..."
        );

        let hash = match client.send_transaction(&tx).await {
            Ok(hash) => hash,
            Err(e) => {
                let outcome =
                    failed_outcome(None, TxStatus::SubmissionFailed, &tx, e.to_string(), start);
                log_failure(&outcome);
                return outcome;
            }
        };

        info!(
            %hash,
            explorer = %explorer_link(&self.explorer_tx_url, &hash),
            "Transaction sent"
        );

        let outcome = match self.wait_for_receipt(client, hash).await {
            Some(true) => TransactionOutcome {
                hash: Some(hash),
                status: TxStatus::Confirmed,
                context: None,
                elapsed: start.elapsed(),
            },
            Some(false) => failed_outcome(
                Some(hash),
                TxStatus::Reverted,
                &tx,
                "Transaction failed. The contract reverted the execution.".to_string(),
                start,
            ),
            None => failed_outcome(
                Some(hash),
                TxStatus::Unconfirmed,
                &tx,
                format!("No receipt within {:?}", self.confirmation_timeout),
                start,
            ),
        };

        if outcome.is_confirmed() {
            info!(%hash, elapsed = ?outcome.elapsed, "Transaction landed");
        } else {
            log_failure(&outcome);
        }
        outcome
    }

    /// Polls for the receipt with exponential backoff until the confirmation
    /// timeout elapses or too many consecutive queries fail.
    async fn wait_for_receipt(&self, client: &dyn ChainClient, hash: TxHash) -> Option<bool> {
        let deadline = tokio::time::Instant::now() + self.confirmation_timeout;
        let mut polls: i32 = 0;
        let mut consecutive_errors = 0u32;

        loop {
            match client.transaction_status(hash).await {
                Ok(Some(status)) => return Some(status),
                Ok(None) => consecutive_errors = 0,
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors > self.max_retries {
                        warn!(
                            %hash,
                            error = %e,
                            "Giving up on receipt after repeated query failures"
                        );
                        return None;
                    }
                    warn!(
                        %hash,
                        attempt = consecutive_errors,
                        max_retries = self.max_retries,
                        error = %e,
                        "Receipt query failed, retrying"
                    );
                }
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return None;
            }
            polls += 1;
            let delay = self
                .retry_base_delay
                .mul_f32(1.5f32.powi(polls.min(10)))
                .min(deadline - now);
            tokio::time::sleep(delay).await;
        }
    }
}

fn failed_outcome(
    hash: Option<TxHash>,
    status: TxStatus,
    tx: &PreparedTransaction,
    error: String,
    start: tokio::time::Instant,
) -> TransactionOutcome {
    TransactionOutcome {
        hash,
        status,
        context: Some(TxContext {
            to: tx.to,
            from: tx.from,
            data: tx.data.clone(),
            error: Some(error),
        }),
        elapsed: start.elapsed(),
    }
}

fn log_failure(outcome: &TransactionOutcome) {
    let context = outcome
        .context
        .as_ref()
        .and_then(|c| serde_json::to_string(c).ok())
        .unwrap_or_default();
    error!(
        hash = ?outcome.hash,
        status = ?outcome.status,
        context = %context,
        "Transaction failed"
    );
}
