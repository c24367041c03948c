use tracing::{debug, warn};

use crate::{
    chain::ChainClient,
    types::FeeParams,
    utils::{format_gwei, DEFAULT_MAX_FEE_PER_GAS, DEFAULT_MAX_PRIORITY_FEE_PER_GAS},
};

/// Produces EIP-1559 fee parameters. Always yields usable values.
#[derive(Debug, Clone)]
pub struct GasEstimator {
    fallback: FeeParams,
}

impl Default for GasEstimator {
    fn default() -> Self {
        Self {
            fallback: FeeParams {
                max_fee_per_gas: DEFAULT_MAX_FEE_PER_GAS,
                max_priority_fee_per_gas: DEFAULT_MAX_PRIORITY_FEE_PER_GAS,
            },
        }
    }
}

impl GasEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fallback(&self) -> FeeParams {
        self.fallback
    }

    /// Live fee data, or the 50/2 gwei fallback when it is unavailable.
    /// Each field falls back independently when the node reports zero.
    pub async fn estimate(&self, client: &dyn ChainClient) -> FeeParams {
        let fees = match client.fee_data().await {
            Ok(fees) => fees,
            Err(e) => {
                warn!(error = %e, "Failed to estimate gas fees, using defaults");
                return self.fallback;
            }
        };

        let max_priority_fee_per_gas = if fees.max_priority_fee_per_gas == 0 {
            self.fallback.max_priority_fee_per_gas
        } else {
            fees.max_priority_fee_per_gas
        };
        let max_fee_per_gas = if fees.max_fee_per_gas == 0 {
            self.fallback.max_fee_per_gas
        } else {
            fees.max_fee_per_gas
        };
        // A max fee below the tip is rejected by the node
        let fees = FeeParams {
            max_fee_per_gas: max_fee_per_gas.max(max_priority_fee_per_gas),
            max_priority_fee_per_gas,
        };
        debug!(
            max_fee_gwei = %format_gwei(fees.max_fee_per_gas),
            priority_fee_gwei = %format_gwei(fees.max_priority_fee_per_gas),
            "Fee estimate"
        );
        fees
    }
}
