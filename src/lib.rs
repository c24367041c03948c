pub mod calldata;
pub mod chain;
pub mod config;
pub mod error;
pub mod menu;
pub mod types;
pub mod utils;
pub mod wallet;

pub use chain::{ChainClient, WalletSession};
pub use config::Config;
pub use error::{ErrorKind, FailurePolicy, Result, WalletError};
pub use types::{AttemptResult, BatchReport, Operation, OperationKind, TransactionOutcome};
pub use wallet::{WalletManager, WalletSelection};
