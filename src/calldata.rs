//! Calldata for the swap and staking entry points.
//!
//! None of the three entry points has a usable ABI, so payloads are assembled
//! from a fixed selector followed by 32-byte words. The trailing zero
//! parameters are reserved fields of the target contracts and are always sent
//! as zero.

use alloy::{
    primitives::{fixed_bytes, Address, Bytes, FixedBytes, U256},
    sol,
    sol_types::{SolCall, SolValue},
};

use crate::types::OperationKind;

pub const FORWARD_SWAP_SELECTOR: FixedBytes<4> = fixed_bytes!("095e7a95");
pub const REVERSE_SWAP_SELECTOR: FixedBytes<4> = fixed_bytes!("3df02124");
pub const STAKE_SELECTOR: FixedBytes<4> = fixed_bytes!("1a5f0f00");

pub const WORD_LEN: usize = 32;
pub const FORWARD_SWAP_WORDS: usize = 7;
pub const REVERSE_SWAP_WORDS: usize = 4;
pub const STAKE_WORDS: usize = 10;

/// Minimum reverse-swap output, in percent of the input.
const MIN_OUTPUT_PERCENT: u64 = 97;

sol! {
    #[sol(rpc)]
    contract IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
    }
}

/// Minimum acceptable reverse-swap output: `floor(amount * 97 / 100)`.
pub fn min_output(amount: U256) -> U256 {
    amount * U256::from(MIN_OUTPUT_PERCENT) / U256::from(100u64)
}

/// A single left-zero-padded 32-byte word.
fn word(value: U256) -> [u8; WORD_LEN] {
    value.to_be_bytes::<WORD_LEN>()
}

fn with_selector(selector: FixedBytes<4>, body: &[u8]) -> Bytes {
    let mut data = Vec::with_capacity(selector.len() + body.len());
    data.extend_from_slice(selector.as_slice());
    data.extend_from_slice(body);
    data.into()
}

/// `selector ‖ abi.encode(wallet, amount, 0, 0, 0, 0, 0)`
pub fn forward_swap(wallet: Address, amount: U256) -> Bytes {
    let params = (
        wallet,
        amount,
        U256::ZERO,
        U256::ZERO,
        U256::ZERO,
        U256::ZERO,
        U256::ZERO,
    )
        .abi_encode_params();
    with_selector(FORWARD_SWAP_SELECTOR, &params)
}

/// `selector ‖ 0 ‖ 1 ‖ amount ‖ min_output(amount)`
pub fn reverse_swap(amount: U256) -> Bytes {
    let mut body = Vec::with_capacity(REVERSE_SWAP_WORDS * WORD_LEN);
    body.extend_from_slice(&word(U256::ZERO));
    body.extend_from_slice(&word(U256::from(1u64)));
    body.extend_from_slice(&word(amount));
    body.extend_from_slice(&word(min_output(amount)));
    with_selector(REVERSE_SWAP_SELECTOR, &body)
}

/// `selector ‖ amount ‖ 9 zero words`
pub fn stake(amount: U256) -> Bytes {
    let mut body = vec![0u8; STAKE_WORDS * WORD_LEN];
    body[..WORD_LEN].copy_from_slice(&word(amount));
    with_selector(STAKE_SELECTOR, &body)
}

/// Payload for the operation transaction of `kind`.
pub fn for_operation(kind: OperationKind, wallet: Address, amount: U256) -> Bytes {
    match kind {
        OperationKind::SwapForward => forward_swap(wallet, amount),
        OperationKind::SwapReverse => reverse_swap(amount),
        OperationKind::Stake => stake(amount),
    }
}

/// Standard ERC-20 `approve(spender, amount)`.
pub fn approve(spender: Address, amount: U256) -> Bytes {
    IERC20::approveCall { spender, amount }.abi_encode().into()
}
