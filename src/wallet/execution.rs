use std::sync::Arc;

use chrono::Local;
use tracing::{error, info, info_span, warn, Instrument};

use crate::{
    calldata,
    chain::ChainClient,
    config::{Config, Contracts},
    error::{FailurePolicy, Result, WalletError},
    types::{
        AttemptReport, AttemptResult, AttemptStage, BatchReport, Operation, OperationKind,
        PreparedTransaction, TokenDescriptor, WalletBalances,
    },
    utils::format_token_amount,
};

use super::{
    allowance::AllowanceManager, balance::BalanceOracle, gas::GasEstimator,
    progress::ProgressManager, transaction::TransactionSubmitter,
};

/// Drives operations attempt by attempt.
///
/// Wallets are processed one at a time and, within a wallet, repetitions one
/// at a time. Each attempt's pre-flight reads therefore observe the effects of
/// the attempt before it.
pub struct OperationRunner {
    contracts: Contracts,
    oracle: BalanceOracle,
    gas: GasEstimator,
    allowance: AllowanceManager,
    submitter: TransactionSubmitter,
}

impl OperationRunner {
    pub fn new(config: &Config) -> Self {
        let gas = GasEstimator::new();
        let submitter = TransactionSubmitter::new(config);
        Self {
            contracts: config.contracts.clone(),
            oracle: BalanceOracle::new(),
            allowance: AllowanceManager::new(gas.clone(), submitter.clone()),
            gas,
            submitter,
        }
    }

    /// Runs `operation.repetitions` attempts for every wallet.
    ///
    /// Each failed attempt is handled by its error's [`FailurePolicy`]. Only a
    /// `Halt` ends the batch; every other failure is recorded and the batch
    /// carries on.
    pub async fn run(
        &self,
        operation: &Operation,
        wallets: &[Arc<dyn ChainClient>],
    ) -> BatchReport {
        let started_at = Local::now();
        let start = tokio::time::Instant::now();
        let repetitions = operation.repetitions.get();
        let total = wallets.len().saturating_mul(repetitions as usize);
        let mut progress = ProgressManager::new(total);
        let mut attempts = Vec::new();

        info!(%operation, wallets = wallets.len(), "Starting batch");

        'batch: for (wallet_index, client) in wallets.iter().enumerate() {
            let wallet = client.address();
            info!(%wallet, "Processing wallet");

            for attempt in 1..=repetitions {
                let span = info_span!("attempt", %wallet, attempt, of = repetitions);
                info!(
                    parent: &span,
                    amount = %operation.amount,
                    symbol = operation.kind.input_symbol(),
                    "Executing {}", operation.kind
                );

                let result = self
                    .run_attempt(client.as_ref(), operation)
                    .instrument(span.clone())
                    .await;
                let policy = result.policy();

                match &result {
                    AttemptResult::Confirmed(_) => {
                        info!(parent: &span, "Transaction {} completed successfully", attempt)
                    }
                    AttemptResult::Aborted { stage, error } => match policy {
                        Some(FailurePolicy::AbortAttempt) => error!(
                            parent: &span,
                            ?stage,
                            %error,
                            "Transaction {} aborted. Continuing to next transaction.", attempt
                        ),
                        _ => warn!(
                            parent: &span,
                            ?stage,
                            %error,
                            ?policy,
                            "Transaction {} skipped. Continuing to next transaction.", attempt
                        ),
                    },
                    AttemptResult::Failed(outcome) => error!(
                        parent: &span,
                        status = ?outcome.status,
                        hash = ?outcome.hash,
                        to = ?outcome.context.as_ref().map(|c| c.to),
                        "Transaction {} failed. Continuing to next transaction.", attempt
                    ),
                }

                progress.update_progress(result.is_success());
                attempts.push(AttemptReport {
                    wallet,
                    wallet_index,
                    attempt,
                    result,
                });

                if policy == Some(FailurePolicy::Halt) {
                    error!(parent: &span, "Unrecoverable failure, stopping batch");
                    break 'batch;
                }
            }

            info!(%wallet, "Completed {} {} transaction(s)", repetitions, operation.kind);
        }

        let report = BatchReport {
            operation: operation.clone(),
            started_at,
            elapsed: start.elapsed(),
            attempts,
        };
        progress.print_statistics(&report);
        report
    }

    /// One pass of the per-attempt state machine.
    pub async fn run_attempt(
        &self,
        client: &dyn ChainClient,
        operation: &Operation,
    ) -> AttemptResult {
        let kind = operation.kind;
        let symbol = kind.input_symbol();
        let spender = kind.target(&self.contracts);
        let token_address = kind.input_token(&self.contracts);

        // CheckBalance
        let decimals = match client.token_decimals(token_address).await {
            Ok(decimals) => decimals,
            Err(error) => {
                warn!(token = %token_address, %error, "Failed to read token decimals");
                return AttemptResult::Aborted {
                    stage: AttemptStage::CheckBalance,
                    error,
                };
            }
        };
        let token = TokenDescriptor {
            address: token_address,
            decimals,
        };
        let required = match operation.amount.to_base_units(decimals) {
            Ok(required) => required,
            Err(error) => {
                return AttemptResult::Aborted {
                    stage: AttemptStage::CheckBalance,
                    error,
                }
            }
        };

        let balance = match self.oracle.token_balance_units(client, &token).await {
            Ok(balance) => balance,
            Err(error) => {
                return AttemptResult::Aborted {
                    stage: AttemptStage::CheckBalance,
                    error,
                }
            }
        };
        let available = format_token_amount(balance, decimals);
        info!(balance = %available, symbol, "Current balance");
        if balance < required {
            error!(
                "Insufficient {} balance. You have {} {} but trying to use {} {}.",
                symbol, available, symbol, operation.amount, symbol
            );
            return AttemptResult::Aborted {
                stage: AttemptStage::CheckBalance,
                error: WalletError::InsufficientBalance {
                    available,
                    required: operation.amount.to_string(),
                },
            };
        }

        // CheckAllowance, Approve, WaitApproveConfirm
        if let Err(error) = self.allowance.ensure(client, &token, spender, required).await {
            return AttemptResult::Aborted {
                stage: AttemptStage::CheckAllowance,
                error,
            };
        }

        // BuildCalldata
        let data = calldata::for_operation(kind, client.address(), required);
        if kind == OperationKind::SwapReverse {
            info!(
                min_output = %format_token_amount(calldata::min_output(required), decimals),
                "Expecting at least this much USDC"
            );
        }

        // EstimateGas
        let fees = self.gas.estimate(client).await;

        // Submit, WaitConfirm
        let tx = PreparedTransaction {
            from: client.address(),
            to: spender,
            data,
            gas_limit: kind.gas_limit(),
            fees,
        };
        let outcome = self.submitter.submit(client, tx).await;
        if !outcome.is_confirmed() {
            return AttemptResult::Failed(outcome);
        }
        info!("{} confirmed!", kind);

        // ReportBalances
        self.report_balances(client, kind).await;
        AttemptResult::Confirmed(outcome)
    }

    async fn report_balances(&self, client: &dyn ChainClient, kind: OperationKind) {
        for (symbol, token) in kind.report_tokens(&self.contracts) {
            let balance = self.oracle.token_balance(client, token).await;
            info!(balance = %balance, symbol, "New balance");
        }
    }

    /// Live decimals of the token `kind` spends.
    pub async fn input_decimals(
        &self,
        client: &dyn ChainClient,
        kind: OperationKind,
    ) -> Result<u8> {
        client.token_decimals(kind.input_token(&self.contracts)).await
    }

    /// Human-scaled balance of the token `kind` spends.
    pub async fn input_balance(&self, client: &dyn ChainClient, kind: OperationKind) -> String {
        self.oracle
            .token_balance(client, kind.input_token(&self.contracts))
            .await
    }

    /// ETH and token balances for every wallet, in order.
    pub async fn wallet_balances(&self, wallets: &[Arc<dyn ChainClient>]) -> Vec<WalletBalances> {
        let mut balances = Vec::with_capacity(wallets.len());
        for client in wallets {
            balances.push(self.oracle.wallet_balances(client.as_ref(), &self.contracts).await);
        }
        balances
    }
}
