use alloy::primitives::{Address, U256};
use tracing::{error, warn};

use crate::{
    chain::ChainClient,
    config::Contracts,
    error::{FailurePolicy, Result, WalletError},
    types::{TokenDescriptor, WalletBalances},
    utils::format_token_amount,
};

/// Reads balances for display and pre-flight checks.
///
/// Recoverable read failures are logged as warnings and reported as a zero
/// balance. Display reads show `"0"` for any failure.
#[derive(Debug, Clone, Default)]
pub struct BalanceOracle;

impl BalanceOracle {
    pub fn new() -> Self {
        Self
    }

    /// Balance of `token` as a human-scaled decimal string, `"0"` on failure.
    pub async fn token_balance(&self, client: &dyn ChainClient, token: Address) -> String {
        let balance = match client.token_balance(token).await {
            Ok(balance) => balance,
            Err(e) => {
                log_read_failure(client, &e, "Failed to check token balance");
                return "0".to_string();
            }
        };
        match client.token_decimals(token).await {
            Ok(decimals) => format_token_amount(balance, decimals),
            Err(e) => {
                log_read_failure(client, &e, "Failed to read token decimals");
                "0".to_string()
            }
        }
    }

    /// Raw base-unit balance of a resolved token. A recoverable read failure
    /// yields zero; any other failure is returned.
    pub async fn token_balance_units(
        &self,
        client: &dyn ChainClient,
        token: &TokenDescriptor,
    ) -> Result<U256> {
        match client.token_balance(token.address).await {
            Ok(balance) => Ok(balance),
            Err(e) => {
                log_read_failure(client, &e, "Failed to check token balance");
                e.substitute(U256::ZERO)
            }
        }
    }

    /// Native ETH balance as a decimal string, `"0"` on failure.
    pub async fn native_balance(&self, client: &dyn ChainClient) -> String {
        match client.native_balance().await {
            Ok(balance) => format_token_amount(balance, 18),
            Err(e) => {
                log_read_failure(client, &e, "Failed to check ETH balance");
                "0".to_string()
            }
        }
    }

    /// ETH, USDC, R2USD and sR2USD balances of one wallet.
    pub async fn wallet_balances(
        &self,
        client: &dyn ChainClient,
        contracts: &Contracts,
    ) -> WalletBalances {
        WalletBalances {
            address: client.address(),
            eth: self.native_balance(client).await,
            usdc: self.token_balance(client, contracts.usdc).await,
            r2usd: self.token_balance(client, contracts.r2usd).await,
            sr2usd: self.token_balance(client, contracts.sr2usd).await,
        }
    }
}

fn log_read_failure(client: &dyn ChainClient, e: &WalletError, message: &str) {
    let wallet = client.address();
    match e.policy() {
        FailurePolicy::WarnAndSubstitute => warn!(%wallet, error = %e, "{}", message),
        _ => error!(%wallet, error = %e, "{}", message),
    }
}
