//! The seam between the protocol core and the surrounding execution
//! environment.
//!
//! The paymaster and vault never touch chain state directly; every read and
//! every value movement goes through [`ChainEnv`]. This keeps the validation
//! state machine a pure function of its inputs and makes the core testable
//! against an in-memory environment.

use alloy_primitives::{Address, U256};
use auto_impl::auto_impl;

/// Errors surfaced by the chain environment when a value movement cannot be
/// performed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvError {
    /// The sending account's native balance is too low for the transfer.
    #[error("insufficient native balance of {account}: requested={requested} available={available}")]
    InsufficientBalance {
        /// The debited account.
        account: Address,
        /// The transfer amount.
        requested: U256,
        /// The account's actual balance.
        available: U256,
    },
    /// The sending account's token balance is too low for the transfer.
    #[error(
        "insufficient balance of token {token} for {account}: requested={requested} available={available}"
    )]
    InsufficientTokenBalance {
        /// The token being transferred.
        token: Address,
        /// The debited account.
        account: Address,
        /// The transfer amount.
        requested: U256,
        /// The account's actual token balance.
        available: U256,
    },
    /// The spender's approved allowance is too low for a `transferFrom`.
    #[error(
        "insufficient allowance of token {token} from {owner} to {spender}: requested={requested} available={available}"
    )]
    InsufficientAllowance {
        /// The token being transferred.
        token: Address,
        /// The account whose funds are pulled.
        owner: Address,
        /// The account performing the pull.
        spender: Address,
        /// The transfer amount.
        requested: U256,
        /// The approved allowance.
        available: U256,
    },
}

/// Read and mutate access to the ambient chain state the protocol depends on:
/// time, account nonces, native balances, and ERC20 balances/allowances.
///
/// Implementations must apply each operation atomically; the core orders its
/// calls so that every fallible check happens before the first mutation of a
/// validation.
#[auto_impl(&mut, Box)]
pub trait ChainEnv {
    /// Current timestamp, in seconds.
    fn timestamp(&self) -> u64;

    /// The on-chain nonce of `account`.
    fn nonce_of(&self, account: Address) -> u64;

    /// Native balance of `account`.
    fn balance_of(&self, account: Address) -> U256;

    /// Moves `value` native currency from `from` to `to`.
    fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), EnvError>;

    /// Balance of `account` in `token`.
    fn token_balance_of(&self, token: Address, account: Address) -> U256;

    /// The amount `owner` has approved `spender` to pull in `token`.
    fn token_allowance(&self, token: Address, owner: Address, spender: Address) -> U256;

    /// Pulls `value` of `token` from `owner` to `to` on behalf of `spender`,
    /// consuming allowance.
    fn token_transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        owner: Address,
        to: Address,
        value: U256,
    ) -> Result<(), EnvError>;

    /// Moves `value` of `token` from `from` to `to` without touching
    /// allowances (the sender spends its own balance).
    fn token_transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), EnvError>;
}
