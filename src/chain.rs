//! Network access for a single signing identity.
//!
//! [`ChainClient`] is the seam between the orchestration logic and the
//! network. [`WalletSession`] is the live implementation: an alloy provider
//! with a wallet filler, optionally routed through an HTTP proxy.

use alloy::{
    network::{Ethereum, EthereumWallet, ReceiptResponse as _, TransactionBuilder},
    primitives::{Address, TxHash, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::{client::RpcClient, types::TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::http::Http,
};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    calldata::IERC20,
    config::{Config, ProxyDescriptor},
    error::{Result, WalletError},
    types::{FeeParams, PreparedTransaction},
};

/// Read and write access to the chain on behalf of one wallet.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address of the signing identity
    fn address(&self) -> Address;

    async fn native_balance(&self) -> Result<U256>;

    async fn token_balance(&self, token: Address) -> Result<U256>;

    async fn token_decimals(&self, token: Address) -> Result<u8>;

    /// Allowance granted by this wallet to `spender` for `token`
    async fn allowance(&self, token: Address, spender: Address) -> Result<U256>;

    async fn fee_data(&self) -> Result<FeeParams>;

    /// Signs and broadcasts, returning as soon as the node accepts the transaction.
    async fn send_transaction(&self, tx: &PreparedTransaction) -> Result<TxHash>;

    /// `None` while pending, otherwise the receipt's success flag.
    async fn transaction_status(&self, hash: TxHash) -> Result<Option<bool>>;
}

/// A signing identity bound to its own connection.
pub struct WalletSession {
    address: Address,
    provider: DynProvider<Ethereum>,
}

impl WalletSession {
    /// Connects `signer` to the configured endpoint, optionally through `proxy`.
    /// Fails if the endpoint reports a chain other than the configured one.
    pub async fn connect(
        signer: PrivateKeySigner,
        config: &Config,
        proxy: Option<ProxyDescriptor>,
    ) -> Result<Self> {
        let url: reqwest::Url = config
            .rpc_url
            .parse()
            .map_err(|e| WalletError::InvalidEnvVar(format!("RPC_URL: {}", e)))?;

        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = &proxy {
            let proxy = reqwest::Proxy::all(proxy.to_url())
                .map_err(|e| WalletError::ProviderError(format!("Invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| {
                WalletError::ProviderError(format!("Failed to build HTTP client: {}", e))
            })?;

        let address = signer.address();
        let rpc_client = RpcClient::new(Http::with_client(client, url), false);
        let provider: DynProvider<Ethereum> = DynProvider::new(
            ProviderBuilder::new()
                .wallet(EthereumWallet::new(signer))
                .on_client(rpc_client),
        );

        let chain_id = provider.get_chain_id().await?;
        if chain_id != config.chain_id {
            return Err(WalletError::ProviderError(format!(
                "Endpoint reports chain {} but {} is configured",
                chain_id, config.chain_id
            )));
        }
        info!(
            wallet = %address,
            chain_id,
            proxy = %proxy.as_ref().map(|p| p.to_string()).unwrap_or_else(|| "direct".into()),
            "Wallet session connected"
        );

        Ok(Self { address, provider })
    }
}

#[async_trait]
impl ChainClient for WalletSession {
    fn address(&self) -> Address {
        self.address
    }

    async fn native_balance(&self) -> Result<U256> {
        self.provider
            .get_balance(self.address)
            .await
            .map_err(|e| WalletError::ReadFailed(format!("Failed to get ETH balance: {}", e)))
    }

    async fn token_balance(&self, token: Address) -> Result<U256> {
        let contract = IERC20::new(token, self.provider.clone());
        let balance = contract
            .balanceOf(self.address)
            .call()
            .await
            .map_err(|e| WalletError::ReadFailed(format!("balanceOf {}: {}", token, e)))?;
        Ok(balance._0)
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        let contract = IERC20::new(token, self.provider.clone());
        let decimals = contract
            .decimals()
            .call()
            .await
            .map_err(|e| WalletError::ReadFailed(format!("decimals {}: {}", token, e)))?;
        Ok(decimals._0)
    }

    async fn allowance(&self, token: Address, spender: Address) -> Result<U256> {
        let contract = IERC20::new(token, self.provider.clone());
        let allowance = contract
            .allowance(self.address, spender)
            .call()
            .await
            .map_err(|e| WalletError::ReadFailed(format!("allowance {}: {}", token, e)))?;
        Ok(allowance._0)
    }

    async fn fee_data(&self) -> Result<FeeParams> {
        let estimate = self.provider.estimate_eip1559_fees().await?;
        debug!(
            max_fee_per_gas = estimate.max_fee_per_gas,
            max_priority_fee_per_gas = estimate.max_priority_fee_per_gas,
            "Estimated EIP-1559 fees"
        );
        Ok(FeeParams {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        })
    }

    async fn send_transaction(&self, tx: &PreparedTransaction) -> Result<TxHash> {
        let request = TransactionRequest::default()
            .with_from(tx.from)
            .with_to(tx.to)
            .with_input(tx.data.clone())
            .with_gas_limit(tx.gas_limit)
            .with_max_fee_per_gas(tx.fees.max_fee_per_gas)
            .with_max_priority_fee_per_gas(tx.fees.max_priority_fee_per_gas);

        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| {
                WalletError::TransactionError(format!("Failed to send transaction: {}", e))
            })?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_status(&self, hash: TxHash) -> Result<Option<bool>> {
        let receipt: Option<alloy_rpc_types::TransactionReceipt> = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| {
                WalletError::ProviderError(format!("Failed to get transaction receipt: {}", e))
            })?;
        Ok(receipt.map(|r| r.status()))
    }
}
