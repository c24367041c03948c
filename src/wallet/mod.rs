pub mod allowance;
pub mod balance;
pub mod execution;
pub mod gas;
pub mod progress;
pub mod transaction;

use rand::seq::IndexedRandom;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    chain::{ChainClient, WalletSession},
    config::Config,
    error::{Result, WalletError},
    types::{Amount, BatchReport, Operation, OperationKind, WalletBalances},
    utils::MAX_REPETITIONS,
};

use self::execution::OperationRunner;

/// Which of the loaded wallets a batch should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletSelection {
    /// Zero-based index into the session list
    Single(usize),
    All,
}

/// Owns the wallet sessions and runs operations against them
pub struct WalletManager {
    sessions: Vec<Arc<dyn ChainClient>>,
    runner: OperationRunner,
}

impl WalletManager {
    /// Builds a manager over already connected sessions
    pub fn new(config: &Config, sessions: Vec<Arc<dyn ChainClient>>) -> Result<Self> {
        if sessions.is_empty() {
            return Err(WalletError::NoSessions);
        }
        Ok(Self {
            sessions,
            runner: OperationRunner::new(config),
        })
    }

    /// Opens one session per configured signer, each through a randomly chosen
    /// proxy when proxies are configured. Signers that fail to connect are skipped.
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut sessions: Vec<Arc<dyn ChainClient>> = Vec::with_capacity(config.signers.len());

        for signer in &config.signers {
            let address = signer.address();
            let proxy = config.proxies.choose(&mut rand::rng()).cloned();
            info!(
                wallet = %address,
                rpc = %config.rpc_url,
                proxy = ?proxy,
                "Connecting wallet"
            );
            match WalletSession::connect(signer.clone(), config, proxy).await {
                Ok(session) => sessions.push(Arc::new(session)),
                Err(e) => error!(wallet = %address, error = %e, "Failed to initialize wallet"),
            }
        }

        Self::new(config, sessions)
    }

    pub fn sessions(&self) -> &[Arc<dyn ChainClient>] {
        &self.sessions
    }

    /// Resolves a selection to the sessions it names
    pub fn select(&self, selection: WalletSelection) -> Result<Vec<Arc<dyn ChainClient>>> {
        match selection {
            WalletSelection::All => Ok(self.sessions.clone()),
            WalletSelection::Single(index) => self
                .sessions
                .get(index)
                .cloned()
                .map(|session| vec![session])
                .ok_or_else(|| {
                    WalletError::InvalidInput(format!(
                        "wallet {} does not exist ({} loaded)",
                        index + 1,
                        self.sessions.len()
                    ))
                }),
        }
    }

    /// Runs `operation` across the selected wallets
    pub async fn execute(
        &self,
        operation: &Operation,
        selection: WalletSelection,
    ) -> Result<BatchReport> {
        if operation.repetitions.get() > MAX_REPETITIONS {
            return Err(WalletError::InvalidInput(format!(
                "at most {} transactions per wallet, got {}",
                MAX_REPETITIONS, operation.repetitions
            )));
        }
        let wallets = self.select(selection)?;
        Ok(self.runner.run(operation, &wallets).await)
    }

    /// Rejects an amount that scales to zero at the input token's precision,
    /// using the decimals reported for the first selected wallet. When the
    /// decimals cannot be read the amount is accepted; every attempt reads them again.
    pub async fn check_amount(
        &self,
        kind: OperationKind,
        amount: &Amount,
        selection: WalletSelection,
    ) -> Result<()> {
        let wallets = self.select(selection)?;
        let Some(first) = wallets.first() else {
            return Ok(());
        };
        match self.runner.input_decimals(first.as_ref(), kind).await {
            Ok(decimals) => amount.to_base_units(decimals).map(|_| ()),
            Err(e) => {
                warn!(
                    error = %e,
                    "Could not read token decimals, precision is checked per attempt"
                );
                Ok(())
            }
        }
    }

    /// Current balance of the token `kind` spends, per selected wallet
    pub async fn input_balances(
        &self,
        kind: OperationKind,
        selection: WalletSelection,
    ) -> Result<Vec<(alloy::primitives::Address, String)>> {
        let mut balances = Vec::new();
        for session in self.select(selection)? {
            let balance = self.runner.input_balance(session.as_ref(), kind).await;
            balances.push((session.address(), balance));
        }
        Ok(balances)
    }

    /// ETH and token balances of every wallet
    pub async fn balances(&self) -> Vec<WalletBalances> {
        self.runner.wallet_balances(&self.sessions).await
    }
}
