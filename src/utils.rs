//! Constants and small helpers shared across the crate.
//!
//! This module provides:
//! - Gas limits for each transaction type
//! - Fallback fee parameters
//! - Private key validation
//! - Explorer link and unit formatting

use alloy::primitives::{TxHash, U256};
use alloy_primitives::utils::format_units;

/// Gas limit for ERC-20 approvals
pub const APPROVE_GAS_LIMIT: u64 = 100_000;
/// Gas limit for staking deposits
pub const STAKE_GAS_LIMIT: u64 = 100_000;
/// Gas limit for both swap directions
pub const SWAP_GAS_LIMIT: u64 = 500_000;

/// Fallback max fee used when fee data cannot be fetched (50 gwei)
pub const DEFAULT_MAX_FEE_PER_GAS: u128 = 50_000_000_000;
/// Fallback priority fee used when fee data cannot be fetched (2 gwei)
pub const DEFAULT_MAX_PRIORITY_FEE_PER_GAS: u128 = 2_000_000_000;

/// Upper bound on attempts per wallet in one batch
pub const MAX_REPETITIONS: u32 = 10_000;

pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;
pub const DEFAULT_RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";
pub const DEFAULT_EXPLORER_TX_URL: &str = "https://sepolia.etherscan.io/tx/";

/// Checks that a private key is exactly 64 hex characters, with an optional `0x` prefix.
pub fn is_valid_private_key(key: &str) -> bool {
    let key = key.trim();
    let key = key.strip_prefix("0x").unwrap_or(key);
    key.len() == 64 && key.chars().all(|c| c.is_ascii_hexdigit())
}

/// Builds a human-followable explorer URL for a transaction.
pub fn explorer_link(base: &str, hash: &TxHash) -> String {
    if base.ends_with('/') {
        format!("{base}{hash}")
    } else {
        format!("{base}/{hash}")
    }
}

/// Formats a base-unit amount, falling back to the raw integer if scaling fails.
pub fn format_token_amount(amount: U256, decimals: u8) -> String {
    format_units(amount, decimals).unwrap_or_else(|_| amount.to_string())
}

/// Formats a wei amount as gwei for log output.
pub fn format_gwei(wei: u128) -> String {
    format_units(U256::from(wei), "gwei").unwrap_or_default()
}
