//! Core type definitions for token operations.
//!
//! This module contains the request types handed to the runner, the
//! transaction and attempt outcomes it produces, and the batch statistics
//! it reports.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy_primitives::utils::parse_units;
use chrono::{DateTime, Local};
use core::fmt;
use serde::Serialize;
use std::{fmt::Display, num::NonZeroU32, str::FromStr};
use tokio::time::{Duration, Instant};

use crate::{
    config::Contracts,
    error::{FailurePolicy, Result, WalletError},
    utils::{APPROVE_GAS_LIMIT, STAKE_GAS_LIMIT, SWAP_GAS_LIMIT},
};

/// The three supported on-chain operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// USDC -> R2USD
    SwapForward,
    /// R2USD -> USDC
    SwapReverse,
    /// R2USD -> sR2USD
    Stake,
}

impl OperationKind {
    /// Symbol of the token spent by the operation.
    pub fn input_symbol(self) -> &'static str {
        match self {
            OperationKind::SwapForward => "USDC",
            OperationKind::SwapReverse | OperationKind::Stake => "R2USD",
        }
    }

    /// Token whose balance and allowance gate the operation.
    pub fn input_token(self, contracts: &Contracts) -> Address {
        match self {
            OperationKind::SwapForward => contracts.usdc,
            OperationKind::SwapReverse | OperationKind::Stake => contracts.r2usd,
        }
    }

    /// Contract the operation is sent to. It is also the allowance spender.
    pub fn target(self, contracts: &Contracts) -> Address {
        match self {
            OperationKind::SwapForward => contracts.forward_swap,
            OperationKind::SwapReverse => contracts.reverse_swap,
            OperationKind::Stake => contracts.staking,
        }
    }

    pub fn gas_limit(self) -> u64 {
        match self {
            OperationKind::SwapForward | OperationKind::SwapReverse => SWAP_GAS_LIMIT,
            OperationKind::Stake => STAKE_GAS_LIMIT,
        }
    }

    /// Balances shown after a confirmed attempt.
    pub fn report_tokens(self, contracts: &Contracts) -> [(&'static str, Address); 2] {
        match self {
            OperationKind::SwapForward | OperationKind::SwapReverse => {
                [("USDC", contracts.usdc), ("R2USD", contracts.r2usd)]
            }
            OperationKind::Stake => [("R2USD", contracts.r2usd), ("sR2USD", contracts.sr2usd)],
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::SwapForward => write!(f, "USDC to R2USD swap"),
            OperationKind::SwapReverse => write!(f, "R2USD to USDC swap"),
            OperationKind::Stake => write!(f, "R2USD staking"),
        }
    }
}

/// A positive human-readable decimal amount, e.g. `"10"` or `"0.25"`.
///
/// Conversion to base units happens per attempt with the token's live decimals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount(String);

impl Amount {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scales the amount by `decimals`. Fractional digits beyond the token's
    /// precision are truncated.
    pub fn to_base_units(&self, decimals: u8) -> Result<U256> {
        let (int, frac) = self.0.split_once('.').unwrap_or((self.0.as_str(), ""));
        let frac = &frac[..frac.len().min(decimals as usize)];
        let normalized = if frac.is_empty() {
            int.to_string()
        } else {
            format!("{int}.{frac}")
        };

        let units: U256 = parse_units(&normalized, decimals)
            .map_err(|e| WalletError::InvalidInput(format!("amount {}: {}", self.0, e)))?
            .into();
        if units.is_zero() {
            return Err(WalletError::InvalidInput(format!(
                "amount {} is below the token precision of {} decimals",
                self.0, decimals
            )));
        }
        Ok(units)
    }
}

impl FromStr for Amount {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let well_formed = s.chars().all(|c| c.is_ascii_digit() || c == '.')
            && s.matches('.').count() <= 1
            && s.chars().any(|c| c.is_ascii_digit());
        if !well_formed {
            return Err(WalletError::InvalidInput(format!(
                "'{s}' is not a positive number"
            )));
        }
        if s.chars().all(|c| c == '0' || c == '.') {
            return Err(WalletError::InvalidInput("amount must be greater than zero".into()));
        }

        let mut normalized = s.trim_end_matches('.').to_string();
        if normalized.starts_with('.') {
            normalized.insert(0, '0');
        }
        Ok(Amount(normalized))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully resolved request from the menu layer.
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    pub amount: Amount,
    /// Number of sequential attempts per wallet
    pub repetitions: NonZeroU32,
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} x{} ({} {})",
            self.kind,
            self.repetitions,
            self.amount,
            self.kind.input_symbol()
        )
    }
}

/// A token's address together with its decimal precision as read from the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDescriptor {
    pub address: Address,
    pub decimals: u8,
}

/// EIP-1559 fee parameters in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeParams {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// A transaction ready to be signed and sent by a [`crate::chain::ChainClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransaction {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub gas_limit: u64,
    pub fees: FeeParams,
}

impl PreparedTransaction {
    pub fn approval(from: Address, token: Address, data: Bytes, fees: FeeParams) -> Self {
        Self {
            from,
            to: token,
            data,
            gas_limit: APPROVE_GAS_LIMIT,
            fees,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Confirmed,
    /// Included, but the receipt reports failed execution
    Reverted,
    /// Failed before or during sending
    SubmissionFailed,
    /// Sent, but no receipt arrived within the confirmation timeout
    Unconfirmed,
}

/// Minimal context attached to a failed submission for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct TxContext {
    pub to: Address,
    pub from: Address,
    pub data: Bytes,
    pub error: Option<String>,
}

/// Result of one submission attempt.
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub hash: Option<TxHash>,
    pub status: TxStatus,
    /// Present on every status except `Confirmed`
    pub context: Option<TxContext>,
    pub elapsed: Duration,
}

impl TransactionOutcome {
    pub fn is_confirmed(&self) -> bool {
        self.status == TxStatus::Confirmed
    }

    /// The error a non-confirmed outcome stands for, `None` when confirmed.
    pub fn error(&self) -> Option<WalletError> {
        let detail = || {
            self.context
                .as_ref()
                .and_then(|c| c.error.clone())
                .unwrap_or_else(|| format!("{:?}", self.status))
        };
        match (self.status, self.hash) {
            (TxStatus::Confirmed, _) => None,
            (TxStatus::Reverted, Some(hash)) => Some(WalletError::Reverted(hash)),
            (TxStatus::Unconfirmed, Some(hash)) => {
                Some(WalletError::Unconfirmed(hash, self.elapsed))
            }
            _ => Some(WalletError::TransactionError(detail())),
        }
    }
}

/// State machine stage at which an attempt stopped without submitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStage {
    CheckBalance,
    CheckAllowance,
}

#[derive(Debug)]
pub enum AttemptResult {
    Confirmed(TransactionOutcome),
    /// Stopped before the operation transaction was sent
    Aborted {
        stage: AttemptStage,
        error: WalletError,
    },
    /// Operation transaction reverted, failed to send or never confirmed
    Failed(TransactionOutcome),
}

impl AttemptResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptResult::Confirmed(_))
    }

    /// How the batch treats this result. `None` for a confirmed attempt.
    pub fn policy(&self) -> Option<FailurePolicy> {
        match self {
            AttemptResult::Confirmed(_) => None,
            AttemptResult::Aborted { error, .. } => Some(error.policy()),
            AttemptResult::Failed(outcome) => outcome.error().map(|e| e.policy()),
        }
    }
}

#[derive(Debug)]
pub struct AttemptReport {
    pub wallet: Address,
    /// Zero-based index of the wallet in the batch
    pub wallet_index: usize,
    /// One-based repetition number within the wallet
    pub attempt: u32,
    pub result: AttemptResult,
}

/// Everything that happened during one menu-triggered batch.
#[derive(Debug)]
pub struct BatchReport {
    pub operation: Operation,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    pub attempts: Vec<AttemptReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.attempts.iter().filter(|a| a.result.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempts.len() - self.succeeded()
    }
}

/// Human-scaled balances for one wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletBalances {
    pub address: Address,
    pub eth: String,
    pub usdc: String,
    pub r2usd: String,
    pub sr2usd: String,
}

/// Running counters for a batch in progress.
#[derive(Debug, Clone)]
pub struct ProgressStats {
    pub total_operations: usize,
    pub completed_operations: usize,
    pub successful_operations: usize,
    pub start_time: Instant,
}

impl ProgressStats {
    pub fn new(total_operations: usize) -> Self {
        Self {
            total_operations,
            completed_operations: 0,
            successful_operations: 0,
            start_time: Instant::now(),
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.completed_operations == 0 {
            return 0.0;
        }
        (self.successful_operations as f64 / self.completed_operations as f64) * 100.0
    }

    pub fn operations_per_minute(&self) -> f64 {
        let minutes = self.start_time.elapsed().as_secs_f64() / 60.0;
        if minutes == 0.0 {
            return 0.0;
        }
        self.completed_operations as f64 / minutes
    }

    pub fn estimated_time_remaining(&self) -> Option<Duration> {
        if self.completed_operations == 0 {
            return None;
        }
        let per_op = self.start_time.elapsed() / self.completed_operations as u32;
        let remaining = self.total_operations.saturating_sub(self.completed_operations);
        Some(per_op * remaining as u32)
    }
}
