use std::time::Duration;

use alloy::primitives::TxHash;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Invalid environment variable value: {0}")]
    InvalidEnvVar(String),

    #[error("No valid private keys found (PRIVATE_KEY_* must be 64 hex characters)")]
    NoValidKeys,

    #[error("No wallet session could be initialized")]
    NoSessions,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: String, required: String },

    #[error("Approval failed: {0}")]
    ApprovalFailed(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Transaction {0} reverted")]
    Reverted(TxHash),

    #[error("Transaction {0} not confirmed within {1:?}")]
    Unconfirmed(TxHash, Duration),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<alloy_transport::TransportError> for WalletError {
    fn from(e: alloy_transport::TransportError) -> Self {
        WalletError::ProviderError(e.to_string())
    }
}

/// Failure classes the runner distinguishes when deciding what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RecoverableRead,
    ApprovalFailure,
    SubmissionError,
    ChainRevert,
    UserInputError,
    FatalStartup,
}

/// What the caller does with a failure of a given [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log a warning and continue with a safe default value.
    WarnAndSubstitute,
    /// Give up on the current attempt; the batch moves on.
    AbortAttempt,
    /// Ask the user again. Never leaves the input layer.
    Reprompt,
    /// Stop the process before any network activity.
    Halt,
}

impl ErrorKind {
    pub fn policy(self) -> FailurePolicy {
        match self {
            ErrorKind::RecoverableRead => FailurePolicy::WarnAndSubstitute,
            ErrorKind::ApprovalFailure
            | ErrorKind::SubmissionError
            | ErrorKind::ChainRevert => FailurePolicy::AbortAttempt,
            ErrorKind::UserInputError => FailurePolicy::Reprompt,
            ErrorKind::FatalStartup => FailurePolicy::Halt,
        }
    }
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::ReadFailed(_) => ErrorKind::RecoverableRead,
            WalletError::ApprovalFailed(_) => ErrorKind::ApprovalFailure,
            WalletError::ProviderError(_)
            | WalletError::InsufficientBalance { .. }
            | WalletError::TransactionError(_)
            | WalletError::Unconfirmed(..) => ErrorKind::SubmissionError,
            WalletError::Reverted(_) => ErrorKind::ChainRevert,
            WalletError::InvalidInput(_) => ErrorKind::UserInputError,
            WalletError::InvalidEnvVar(_)
            | WalletError::NoValidKeys
            | WalletError::NoSessions
            | WalletError::IoError(_) => ErrorKind::FatalStartup,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.kind().policy()
    }

    /// Resolves a failed read: errors whose policy is
    /// [`FailurePolicy::WarnAndSubstitute`] become `default`, anything else is
    /// handed back to the caller.
    pub fn substitute<T>(self, default: T) -> Result<T> {
        match self.policy() {
            FailurePolicy::WarnAndSubstitute => Ok(default),
            _ => Err(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;
