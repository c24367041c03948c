#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use parking_lot::Mutex;

use r2_smith::{
    chain::ChainClient,
    config::Config,
    error::{Result, WalletError},
    types::{FeeParams, PreparedTransaction},
};

const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

/// What happens to the next transaction sent through a [`MockChain`].
#[derive(Debug, Clone, Copy)]
pub enum SendScript {
    Confirm,
    Revert,
    /// The node rejects the transaction outright
    Reject,
    /// Accepted but never included
    Pending,
    /// Included after this many empty receipt polls
    ConfirmAfter(u32),
}

/// How reads fail once failures are switched on.
#[derive(Debug, Clone, Copy)]
enum ReadFailure {
    /// Transient read error the caller may paper over
    Flaky,
    /// Node unreachable
    Outage,
}

#[derive(Debug)]
struct Receipt {
    polls_left: u32,
    status: Option<bool>,
}

#[derive(Default)]
struct MockState {
    token_balances: HashMap<Address, U256>,
    decimals: HashMap<Address, u8>,
    allowances: HashMap<(Address, Address), U256>,
    native_balance: U256,
    fees: Option<FeeParams>,
    fail_reads: Option<ReadFailure>,
    fail_reads_after_confirm: bool,
    allowance_failure: Option<ReadFailure>,
    receipt_errors: u32,
    script: VecDeque<SendScript>,
    debit: Option<(Address, U256)>,
    sent: Vec<PreparedTransaction>,
    receipts: HashMap<TxHash, Receipt>,
    next_hash: u64,
}

/// In-memory chain for a single wallet. Confirmed approvals update the
/// allowance; confirmed operations apply the configured debit.
pub struct MockChain {
    address: Address,
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            state: Mutex::new(MockState {
                fees: Some(FeeParams {
                    max_fee_per_gas: 30_000_000_000,
                    max_priority_fee_per_gas: 1_500_000_000,
                }),
                ..Default::default()
            }),
        }
    }

    pub fn with_token(self, token: Address, decimals: u8, balance: U256) -> Self {
        {
            let mut state = self.state.lock();
            state.decimals.insert(token, decimals);
            state.token_balances.insert(token, balance);
        }
        self
    }

    pub fn with_allowance(self, token: Address, spender: Address, amount: U256) -> Self {
        self.state.lock().allowances.insert((token, spender), amount);
        self
    }

    pub fn with_native_balance(self, wei: U256) -> Self {
        self.state.lock().native_balance = wei;
        self
    }

    pub fn with_fees(self, fees: Option<FeeParams>) -> Self {
        self.state.lock().fees = fees;
        self
    }

    pub fn failing_reads(self) -> Self {
        self.state.lock().fail_reads = Some(ReadFailure::Flaky);
        self
    }

    /// Reads fail with a provider error rather than a plain read failure.
    pub fn with_provider_outage(self) -> Self {
        self.state.lock().fail_reads = Some(ReadFailure::Outage);
        self
    }

    /// Only allowance reads fail, with a plain read failure.
    pub fn failing_allowance_reads(self) -> Self {
        self.state.lock().allowance_failure = Some(ReadFailure::Flaky);
        self
    }

    /// Only allowance reads fail, with a provider error.
    pub fn with_allowance_outage(self) -> Self {
        self.state.lock().allowance_failure = Some(ReadFailure::Outage);
        self
    }

    /// Reads start failing once the first transaction confirms.
    pub fn failing_reads_after_confirm(self) -> Self {
        self.state.lock().fail_reads_after_confirm = true;
        self
    }

    pub fn with_receipt_errors(self, count: u32) -> Self {
        self.state.lock().receipt_errors = count;
        self
    }

    pub fn with_script(self, script: impl IntoIterator<Item = SendScript>) -> Self {
        self.state.lock().script = script.into_iter().collect();
        self
    }

    /// Every confirmed non-approval transaction spends `amount` of `token`.
    pub fn debit_on_confirm(self, token: Address, amount: U256) -> Self {
        self.state.lock().debit = Some((token, amount));
        self
    }

    pub fn sent(&self) -> Vec<PreparedTransaction> {
        self.state.lock().sent.clone()
    }

    pub fn allowance_of(&self, token: Address, spender: Address) -> U256 {
        self.state
            .lock()
            .allowances
            .get(&(token, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn into_client(self) -> Arc<dyn ChainClient> {
        Arc::new(self)
    }

    fn read_guard(&self, what: &str) -> Result<()> {
        fail_with(self.state.lock().fail_reads, what)
    }
}

fn fail_with(failure: Option<ReadFailure>, what: &str) -> Result<()> {
    match failure {
        None => Ok(()),
        Some(ReadFailure::Flaky) => {
            Err(WalletError::ReadFailed(format!("{what}: connection reset")))
        }
        Some(ReadFailure::Outage) => {
            Err(WalletError::ProviderError(format!("{what}: connection refused")))
        }
    }
}

fn apply_inclusion(state: &mut MockState, tx: &PreparedTransaction) {
    if tx.data.len() >= 68 && tx.data[..4] == APPROVE_SELECTOR {
        let spender = Address::from_slice(&tx.data[16..36]);
        let amount = U256::from_be_slice(&tx.data[36..68]);
        state.allowances.insert((tx.to, spender), amount);
        return;
    }
    if let Some((token, amount)) = state.debit {
        let balance = state.token_balances.entry(token).or_default();
        *balance = balance.saturating_sub(amount);
        let allowance = state.allowances.entry((token, tx.to)).or_default();
        *allowance = allowance.saturating_sub(amount);
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn address(&self) -> Address {
        self.address
    }

    async fn native_balance(&self) -> Result<U256> {
        self.read_guard("getBalance")?;
        Ok(self.state.lock().native_balance)
    }

    async fn token_balance(&self, token: Address) -> Result<U256> {
        self.read_guard("balanceOf")?;
        Ok(self
            .state
            .lock()
            .token_balances
            .get(&token)
            .copied()
            .unwrap_or_default())
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        self.read_guard("decimals")?;
        self.state
            .lock()
            .decimals
            .get(&token)
            .copied()
            .ok_or_else(|| WalletError::ReadFailed(format!("decimals {token}: execution reverted")))
    }

    async fn allowance(&self, token: Address, spender: Address) -> Result<U256> {
        self.read_guard("allowance")?;
        fail_with(self.state.lock().allowance_failure, "allowance")?;
        Ok(self.allowance_of(token, spender))
    }

    async fn fee_data(&self) -> Result<FeeParams> {
        self.state
            .lock()
            .fees
            .ok_or_else(|| WalletError::ProviderError("eth_gasPrice unavailable".into()))
    }

    async fn send_transaction(&self, tx: &PreparedTransaction) -> Result<TxHash> {
        let mut state = self.state.lock();
        state.sent.push(tx.clone());
        let script = state.script.pop_front().unwrap_or(SendScript::Confirm);
        if let SendScript::Reject = script {
            return Err(WalletError::TransactionError(
                "Failed to send transaction: insufficient funds for gas".into(),
            ));
        }

        state.next_hash += 1;
        let hash = TxHash::with_last_byte(state.next_hash as u8);
        let receipt = match script {
            SendScript::Confirm => Receipt { polls_left: 0, status: Some(true) },
            SendScript::Revert => Receipt { polls_left: 0, status: Some(false) },
            SendScript::Pending => Receipt { polls_left: u32::MAX, status: None },
            SendScript::ConfirmAfter(polls) => Receipt { polls_left: polls, status: Some(true) },
            SendScript::Reject => unreachable!(),
        };
        if receipt.status == Some(true) {
            apply_inclusion(&mut state, tx);
            if state.fail_reads_after_confirm {
                state.fail_reads = Some(ReadFailure::Flaky);
            }
        }
        state.receipts.insert(hash, receipt);
        Ok(hash)
    }

    async fn transaction_status(&self, hash: TxHash) -> Result<Option<bool>> {
        let mut state = self.state.lock();
        if state.receipt_errors > 0 {
            state.receipt_errors -= 1;
            return Err(WalletError::ProviderError("receipt query timed out".into()));
        }
        let receipt = state
            .receipts
            .get_mut(&hash)
            .ok_or_else(|| WalletError::ProviderError(format!("unknown transaction {hash}")))?;
        if receipt.polls_left > 0 {
            receipt.polls_left = receipt.polls_left.saturating_sub(1);
            return Ok(None);
        }
        Ok(receipt.status)
    }
}

/// Configuration with short waits so failure paths finish quickly.
pub fn test_config() -> Config {
    Config {
        confirmation_timeout: Duration::from_millis(50),
        max_retries: 2,
        retry_base_delay_ms: 1,
        ..Config::default()
    }
}

pub fn wallet(n: u8) -> Address {
    Address::with_last_byte(n)
}

/// `amount` whole tokens at `decimals` precision.
pub fn units(amount: u64, decimals: u8) -> U256 {
    U256::from(amount) * U256::from(10u64).pow(U256::from(decimals))
}
