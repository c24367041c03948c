mod common;

use std::sync::Arc;

use alloy::primitives::U256;
use r2_smith::{
    calldata,
    chain::ChainClient,
    config::Contracts,
    error::WalletError,
    types::{FeeParams, PreparedTransaction, TokenDescriptor, TxStatus},
    utils::{DEFAULT_MAX_FEE_PER_GAS, DEFAULT_MAX_PRIORITY_FEE_PER_GAS},
    wallet::{
        allowance::AllowanceManager, balance::BalanceOracle, gas::GasEstimator,
        transaction::TransactionSubmitter, WalletManager, WalletSelection,
    },
};

use common::{test_config, units, wallet, MockChain, SendScript};

fn allowance_manager() -> AllowanceManager {
    AllowanceManager::new(GasEstimator::new(), TransactionSubmitter::new(&test_config()))
}

fn usdc() -> TokenDescriptor {
    TokenDescriptor {
        address: Contracts::default().usdc,
        decimals: 6,
    }
}

#[tokio::test]
async fn balance_oracle_formats_token_and_native_balances() {
    let c = Contracts::default();
    let mock = MockChain::new(wallet(1))
        .with_token(c.usdc, 6, U256::from(5_000_000u64))
        .with_token(c.r2usd, 6, U256::from(1_500_000u64))
        .with_token(c.sr2usd, 6, U256::ZERO)
        .with_native_balance(U256::from(10u64).pow(U256::from(17u64)));
    let oracle = BalanceOracle::new();

    assert_eq!(oracle.token_balance(&mock, c.usdc).await, "5.000000");
    let balances = oracle.wallet_balances(&mock, &c).await;
    assert_eq!(balances.address, wallet(1));
    assert_eq!(balances.eth, "0.100000000000000000");
    assert_eq!(balances.r2usd, "1.500000");
    assert_eq!(balances.sr2usd, "0.000000");
}

#[tokio::test]
async fn balance_oracle_returns_zero_when_reads_fail() {
    let c = Contracts::default();
    let mock = MockChain::new(wallet(1))
        .with_token(c.usdc, 6, U256::from(5_000_000u64))
        .failing_reads();
    let oracle = BalanceOracle::new();

    assert_eq!(oracle.token_balance(&mock, c.usdc).await, "0");
    assert_eq!(oracle.native_balance(&mock).await, "0");
    assert_eq!(oracle.token_balance_units(&mock, &usdc()).await.unwrap(), U256::ZERO);
}

#[tokio::test]
async fn balance_oracle_hands_back_errors_it_cannot_substitute() {
    let c = Contracts::default();
    let mock = MockChain::new(wallet(1))
        .with_token(c.usdc, 6, U256::from(5_000_000u64))
        .with_provider_outage();
    let oracle = BalanceOracle::new();

    assert!(matches!(
        oracle.token_balance_units(&mock, &usdc()).await,
        Err(WalletError::ProviderError(_))
    ));
    // display reads still render a zero
    assert_eq!(oracle.token_balance(&mock, c.usdc).await, "0");
}

#[tokio::test]
async fn sufficient_allowance_means_no_write() {
    let c = Contracts::default();
    let required = units(10, 6);
    let mock = MockChain::new(wallet(1)).with_allowance(c.usdc, c.forward_swap, required);

    let result = allowance_manager()
        .ensure(&mock, &usdc(), c.forward_swap, required)
        .await;

    assert!(result.is_ok(), "{result:?}");
    assert!(mock.sent().is_empty());
}

#[tokio::test]
async fn short_allowance_is_raised_to_exactly_the_required_amount() {
    let c = Contracts::default();
    let required = units(10, 6);
    let mock = MockChain::new(wallet(1)).with_allowance(c.usdc, c.forward_swap, units(3, 6));

    let result = allowance_manager()
        .ensure(&mock, &usdc(), c.forward_swap, required)
        .await;

    assert!(result.is_ok(), "{result:?}");
    let sent = mock.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, c.usdc);
    assert_eq!(sent[0].from, wallet(1));
    assert_eq!(sent[0].gas_limit, 100_000);
    assert_eq!(sent[0].data, calldata::approve(c.forward_swap, required));
    assert_eq!(mock.allowance_of(c.usdc, c.forward_swap), required);
}

#[tokio::test]
async fn unreadable_allowance_is_treated_as_insufficient() {
    let c = Contracts::default();
    let mock = MockChain::new(wallet(1)).failing_reads();

    let result = allowance_manager()
        .ensure(&mock, &usdc(), c.forward_swap, units(1, 6))
        .await;

    assert!(result.is_ok(), "{result:?}");
    assert_eq!(mock.sent().len(), 1);
}

#[tokio::test]
async fn allowance_outage_aborts_without_approving() {
    let c = Contracts::default();
    let mock = MockChain::new(wallet(1)).with_provider_outage();

    let result = allowance_manager()
        .ensure(&mock, &usdc(), c.forward_swap, units(1, 6))
        .await;

    assert!(matches!(result, Err(WalletError::ProviderError(_))));
    assert!(mock.sent().is_empty());
}

#[tokio::test]
async fn reverted_approval_reports_failure() {
    let c = Contracts::default();
    let mock = MockChain::new(wallet(1)).with_script([SendScript::Revert]);

    let result = allowance_manager()
        .ensure(&mock, &usdc(), c.staking, units(1, 6))
        .await;

    assert!(matches!(result, Err(WalletError::ApprovalFailed(_))));
}

#[tokio::test]
async fn gas_estimator_passes_live_fees_through() {
    let fees = FeeParams {
        max_fee_per_gas: 7_000_000_000,
        max_priority_fee_per_gas: 1_000_000_000,
    };
    let mock = MockChain::new(wallet(1)).with_fees(Some(fees));

    assert_eq!(GasEstimator::new().estimate(&mock).await, fees);
}

#[tokio::test]
async fn gas_estimator_falls_back_when_fee_data_is_unavailable() {
    let mock = MockChain::new(wallet(1)).with_fees(None);

    let fees = GasEstimator::new().estimate(&mock).await;

    assert_eq!(fees.max_fee_per_gas, DEFAULT_MAX_FEE_PER_GAS);
    assert_eq!(fees.max_priority_fee_per_gas, DEFAULT_MAX_PRIORITY_FEE_PER_GAS);
}

#[tokio::test]
async fn gas_estimator_replaces_zero_fields() {
    let mock = MockChain::new(wallet(1)).with_fees(Some(FeeParams {
        max_fee_per_gas: 0,
        max_priority_fee_per_gas: 0,
    }));

    assert_eq!(
        GasEstimator::new().estimate(&mock).await,
        GasEstimator::new().fallback()
    );
}

fn prepared(to_n: u8) -> PreparedTransaction {
    PreparedTransaction {
        from: wallet(1),
        to: wallet(to_n),
        data: calldata::stake(U256::from(1u64)),
        gas_limit: 100_000,
        fees: GasEstimator::new().fallback(),
    }
}

#[tokio::test]
async fn submitter_waits_through_pending_polls() {
    let mock = MockChain::new(wallet(1)).with_script([SendScript::ConfirmAfter(3)]);
    let submitter = TransactionSubmitter::new(&test_config());

    let outcome = submitter.submit(&mock, prepared(9)).await;

    assert_eq!(outcome.status, TxStatus::Confirmed);
    assert!(outcome.context.is_none());
}

#[tokio::test]
async fn submitter_tolerates_transient_receipt_errors() {
    let mock = MockChain::new(wallet(1)).with_receipt_errors(2);
    let submitter = TransactionSubmitter::new(&test_config());

    let outcome = submitter.submit(&mock, prepared(9)).await;

    assert_eq!(outcome.status, TxStatus::Confirmed);
}

#[tokio::test]
async fn submitter_gives_up_after_too_many_receipt_errors() {
    let mock = MockChain::new(wallet(1)).with_receipt_errors(10);
    let submitter = TransactionSubmitter::new(&test_config());

    let outcome = submitter.submit(&mock, prepared(9)).await;

    assert_eq!(outcome.status, TxStatus::Unconfirmed);
    let context = outcome.context.unwrap();
    assert_eq!(context.to, wallet(9));
    assert_eq!(context.from, wallet(1));
}

#[tokio::test]
async fn revert_is_classified_separately_from_submission_failure() {
    let mock = MockChain::new(wallet(1)).with_script([SendScript::Revert, SendScript::Reject]);
    let submitter = TransactionSubmitter::new(&test_config());

    let reverted = submitter.submit(&mock, prepared(9)).await;
    let rejected = submitter.submit(&mock, prepared(9)).await;

    assert_eq!(reverted.status, TxStatus::Reverted);
    assert!(reverted.hash.is_some());
    assert_eq!(rejected.status, TxStatus::SubmissionFailed);
    assert!(rejected.hash.is_none());
}

#[test]
fn wallet_manager_requires_a_session() {
    let err = WalletManager::new(&test_config(), Vec::new()).err().unwrap();
    assert!(matches!(err, WalletError::NoSessions));
}

#[test]
fn wallet_selection_is_bounds_checked() {
    let sessions: Vec<Arc<dyn ChainClient>> = vec![
        MockChain::new(wallet(1)).into_client(),
        MockChain::new(wallet(2)).into_client(),
    ];
    let manager = WalletManager::new(&test_config(), sessions).unwrap();

    assert_eq!(manager.select(WalletSelection::All).unwrap().len(), 2);
    assert_eq!(
        manager.select(WalletSelection::Single(1)).unwrap()[0].address(),
        wallet(2)
    );
    assert!(matches!(
        manager.select(WalletSelection::Single(2)),
        Err(WalletError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn wallet_manager_runs_only_the_selected_wallet() {
    let c = Contracts::default();
    let funded = |n| {
        Arc::new(
            MockChain::new(wallet(n))
                .with_token(c.usdc, 6, units(100, 6))
                .with_allowance(c.usdc, c.forward_swap, U256::MAX),
        )
    };
    let first = funded(1);
    let second = funded(2);
    let sessions: Vec<Arc<dyn ChainClient>> = vec![first.clone(), second.clone()];
    let manager = WalletManager::new(&test_config(), sessions).unwrap();

    let operation = r2_smith::Operation {
        kind: r2_smith::OperationKind::SwapForward,
        amount: "1".parse().unwrap(),
        repetitions: std::num::NonZeroU32::new(1).unwrap(),
    };
    let report = manager
        .execute(&operation, WalletSelection::Single(1))
        .await
        .unwrap();

    assert_eq!(report.attempts.len(), 1);
    assert!(first.sent().is_empty());
    assert_eq!(second.sent().len(), 1);
}

#[tokio::test]
async fn wallet_manager_refuses_oversized_batches() {
    let c = Contracts::default();
    let mock = Arc::new(
        MockChain::new(wallet(1))
            .with_token(c.usdc, 6, units(100, 6))
            .with_allowance(c.usdc, c.forward_swap, U256::MAX),
    );
    let sessions: Vec<Arc<dyn ChainClient>> = vec![mock.clone()];
    let manager = WalletManager::new(&test_config(), sessions).unwrap();

    let operation = r2_smith::Operation {
        kind: r2_smith::OperationKind::SwapForward,
        amount: "1".parse().unwrap(),
        repetitions: std::num::NonZeroU32::new(u32::MAX).unwrap(),
    };
    let err = manager
        .execute(&operation, WalletSelection::All)
        .await
        .unwrap_err();

    assert!(matches!(err, WalletError::InvalidInput(_)));
    assert!(mock.sent().is_empty());
}

#[tokio::test]
async fn amounts_below_token_precision_are_caught_before_the_batch() {
    let c = Contracts::default();
    let sessions = vec![MockChain::new(wallet(1))
        .with_token(c.r2usd, 6, units(100, 6))
        .into_client()];
    let manager = WalletManager::new(&test_config(), sessions).unwrap();
    let kind = r2_smith::OperationKind::Stake;

    let dust = "0.0000001".parse().unwrap();
    let err = manager
        .check_amount(kind, &dust, WalletSelection::All)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InvalidInput(_)));

    let fine = "0.000001".parse().unwrap();
    assert!(manager.check_amount(kind, &fine, WalletSelection::All).await.is_ok());
}
