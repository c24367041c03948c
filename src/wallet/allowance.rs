use alloy::primitives::{Address, U256};
use tracing::{info, warn};

use crate::{
    calldata,
    chain::ChainClient,
    error::{Result, WalletError},
    types::{PreparedTransaction, TokenDescriptor},
    utils::format_token_amount,
};

use super::{gas::GasEstimator, transaction::TransactionSubmitter};

/// Makes sure a spender may pull the required amount before a transfer-consuming call.
#[derive(Debug, Clone)]
pub struct AllowanceManager {
    gas: GasEstimator,
    submitter: TransactionSubmitter,
}

impl AllowanceManager {
    pub fn new(gas: GasEstimator, submitter: TransactionSubmitter) -> Self {
        Self { gas, submitter }
    }

    /// Succeeds once `spender` is allowed to move at least `required` of `token`.
    ///
    /// The allowance is read live on every call; a previous attempt may have
    /// consumed it. A recoverable read failure counts as a zero allowance. When
    /// it falls short, an approval for exactly `required` is submitted and awaited.
    pub async fn ensure(
        &self,
        client: &dyn ChainClient,
        token: &TokenDescriptor,
        spender: Address,
        required: U256,
    ) -> Result<()> {
        let current = match client.allowance(token.address, spender).await {
            Ok(current) => current,
            Err(e) => {
                warn!(token = %token.address, %spender, error = %e, "Failed to read allowance");
                e.substitute(U256::ZERO)?
            }
        };
        info!(
            %spender,
            allowance = %format_token_amount(current, token.decimals),
            "Current allowance"
        );
        if current >= required {
            info!("Sufficient allowance already exists");
            return Ok(());
        }

        info!(
            amount = %format_token_amount(required, token.decimals),
            %spender,
            "Approving tokens for spending..."
        );
        let fees = self.gas.estimate(client).await;
        let tx = PreparedTransaction::approval(
            client.address(),
            token.address,
            calldata::approve(spender, required),
            fees,
        );

        let outcome = self.submitter.submit(client, tx).await;
        match outcome.error() {
            None => {
                info!("Approval confirmed");
                Ok(())
            }
            Some(e) => {
                warn!(status = ?outcome.status, error = %e, "Approval was not confirmed");
                Err(WalletError::ApprovalFailed(format!(
                    "approval of {} for {}: {}",
                    format_token_amount(required, token.decimals),
                    spender,
                    e
                )))
            }
        }
    }
}
