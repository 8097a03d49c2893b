//! The pooled sponsorship vault.
//!
//! Protocols deposit native currency earmarked for subsidizing their users'
//! fees. The vault is a peer of the paymaster, linked by a single stored
//! address: only that paymaster may draw subsidies, and only a depositor may
//! withdraw its own balance. Every debit updates the ledger before moving
//! value out (checks-effects-interactions), so a failed or re-entered
//! transfer can never double-spend a balance.

use alloy_primitives::{map::HashMap, Address, U256};

use crate::env::{ChainEnv, EnvError};

/// Errors of the vault's three operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    /// The subsidy operation was called by something other than the bound
    /// paymaster.
    #[error("caller {caller} is not the bound paymaster")]
    Unauthorized {
        /// The rejected caller.
        caller: Address,
    },
    /// A debit exceeds the depositor's recorded balance.
    #[error("vault balance too low: requested={requested} available={available}")]
    InsufficientBalance {
        /// The requested debit.
        requested: U256,
        /// The depositor's recorded balance.
        available: U256,
    },
    /// The underlying value transfer failed.
    #[error(transparent)]
    Transfer(#[from] EnvError),
}

/// Per-depositor ledger of sponsorship funds, held at the vault's own
/// account in the chain environment.
///
/// Invariants: the sum of recorded balances never exceeds the vault's held
/// balance, and no debit overdraws a depositor. Two concurrent overdrawing
/// debits cannot both succeed; the second observes the already-reduced
/// balance.
#[derive(Debug, Clone)]
pub struct SponsorshipVault {
    address: Address,
    paymaster: Address,
    balances: HashMap<Address, U256>,
}

impl SponsorshipVault {
    /// Creates a vault bound to one paymaster identity.
    pub fn new(address: Address, paymaster: Address) -> Self {
        Self { address, paymaster, balances: HashMap::default() }
    }

    /// The vault's own account.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The single identity allowed to draw subsidies.
    pub const fn paymaster(&self) -> Address {
        self.paymaster
    }

    /// The recorded balance of `depositor`.
    pub fn balance_of(&self, depositor: Address) -> U256 {
        self.balances.get(&depositor).copied().unwrap_or_default()
    }

    /// Sum of all recorded balances.
    pub fn total_deposits(&self) -> U256 {
        self.balances.values().fold(U256::ZERO, |acc, balance| acc + balance)
    }

    /// Credits `amount` to `depositor`, funded by `caller`. Anyone may fund
    /// any depositor's account; the value transfer is atomic with the credit
    /// (no credit if the transfer fails).
    pub fn deposit_to_account(
        &mut self,
        env: &mut impl ChainEnv,
        caller: Address,
        depositor: Address,
        amount: U256,
    ) -> Result<(), VaultError> {
        env.transfer(caller, self.address, amount)?;
        *self.balances.entry(depositor).or_default() += amount;
        Ok(())
    }

    /// A plain value transfer to the vault credits the sender's own account.
    pub fn receive(
        &mut self,
        env: &mut impl ChainEnv,
        caller: Address,
        amount: U256,
    ) -> Result<(), VaultError> {
        self.deposit_to_account(env, caller, caller, amount)
    }

    /// Returns `amount` of the caller's own balance. Fails with
    /// [`VaultError::InsufficientBalance`] on overdraft; the ledger is
    /// debited before the funds leave.
    pub fn withdraw(
        &mut self,
        env: &mut impl ChainEnv,
        caller: Address,
        amount: U256,
    ) -> Result<(), VaultError> {
        let balance = self.balance_of(caller);
        if amount > balance {
            return Err(VaultError::InsufficientBalance { requested: amount, available: balance });
        }
        self.balances.insert(caller, balance - amount);
        env.transfer(self.address, caller, amount)?;
        Ok(())
    }

    /// Debits `depositor` by `amount` and transfers it to the caller, which
    /// must be the bound paymaster. A shortfall fails the draw outright;
    /// there is no partial sponsorship.
    pub fn get_sponsorship(
        &mut self,
        env: &mut impl ChainEnv,
        caller: Address,
        depositor: Address,
        amount: U256,
    ) -> Result<(), VaultError> {
        if caller != self.paymaster {
            return Err(VaultError::Unauthorized { caller });
        }
        let balance = self.balance_of(depositor);
        if amount > balance {
            return Err(VaultError::InsufficientBalance { requested: amount, available: balance });
        }
        self.balances.insert(depositor, balance - amount);
        env.transfer(self.address, caller, amount)?;
        Ok(())
    }
}
