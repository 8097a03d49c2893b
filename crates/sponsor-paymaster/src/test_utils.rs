//! In-memory chain environment and signing helpers for tests.

use alloy_primitives::{keccak256, map::HashMap, Address, B256, U256};
use k256::ecdsa::SigningKey;

use crate::{
    constants::SIGNATURE_LENGTH,
    env::{ChainEnv, EnvError},
};

/// A deterministic test address: every byte set to `n`.
pub fn addr(n: u8) -> Address {
    Address::repeat_byte(n)
}

/// A deterministic signing key derived from `n`. Panics on `n == 0`, which is
/// not a valid scalar.
pub fn signer_key(n: u8) -> SigningKey {
    SigningKey::from_slice(&[n; 32]).unwrap()
}

/// The Ethereum address of `key`.
pub fn signer_address(key: &SigningKey) -> Address {
    let point = key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Signs `hash` directly (no EIP-191 wrap), producing the 65-byte
/// `r ‖ s ‖ v` form with `v` in the 27/28 convention.
pub fn sign_hash(key: &SigningKey, hash: B256) -> [u8; SIGNATURE_LENGTH] {
    let (signature, recovery_id) = key.sign_prehash_recoverable(hash.as_slice()).unwrap();
    let mut out = [0u8; SIGNATURE_LENGTH];
    out[..64].copy_from_slice(&signature.to_bytes());
    out[64] = 27 + recovery_id.to_byte();
    out
}

/// An in-memory [`ChainEnv`]: timestamps, nonces, native balances, and token
/// balances/allowances, all mutated atomically per call.
#[derive(Debug, Clone, Default)]
pub struct MockChain {
    timestamp: u64,
    nonces: HashMap<Address, u64>,
    balances: HashMap<Address, U256>,
    token_balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
}

impl MockChain {
    /// An empty chain at timestamp zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` native currency to `account` out of thin air.
    pub fn fund(&mut self, account: Address, amount: U256) {
        *self.balances.entry(account).or_default() += amount;
    }

    /// Mints `amount` of `token` to `account`.
    pub fn mint(&mut self, token: Address, account: Address, amount: U256) {
        *self.token_balances.entry((token, account)).or_default() += amount;
    }

    /// Sets `owner`'s allowance of `token` towards `spender`.
    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((token, owner, spender), amount);
    }

    /// Sets the on-chain nonce of `account`.
    pub fn set_nonce(&mut self, account: Address, nonce: u64) {
        self.nonces.insert(account, nonce);
    }

    /// Sets the current timestamp.
    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    /// Advances the current timestamp by `seconds`.
    pub fn warp(&mut self, seconds: u64) {
        self.timestamp += seconds;
    }
}

impl ChainEnv for MockChain {
    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn nonce_of(&self, account: Address) -> u64 {
        self.nonces.get(&account).copied().unwrap_or_default()
    }

    fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), EnvError> {
        let available = self.balance_of(from);
        if value > available {
            return Err(EnvError::InsufficientBalance { account: from, requested: value, available });
        }
        self.balances.insert(from, available - value);
        *self.balances.entry(to).or_default() += value;
        Ok(())
    }

    fn token_balance_of(&self, token: Address, account: Address) -> U256 {
        self.token_balances.get(&(token, account)).copied().unwrap_or_default()
    }

    fn token_allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.allowances.get(&(token, owner, spender)).copied().unwrap_or_default()
    }

    fn token_transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        owner: Address,
        to: Address,
        value: U256,
    ) -> Result<(), EnvError> {
        let allowance = self.token_allowance(token, owner, spender);
        if value > allowance {
            return Err(EnvError::InsufficientAllowance {
                token,
                owner,
                spender,
                requested: value,
                available: allowance,
            });
        }
        self.token_transfer(token, owner, to, value)?;
        self.allowances.insert((token, owner, spender), allowance - value);
        Ok(())
    }

    fn token_transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), EnvError> {
        let available = self.token_balance_of(token, from);
        if value > available {
            return Err(EnvError::InsufficientTokenBalance {
                token,
                account: from,
                requested: value,
                available,
            });
        }
        self.token_balances.insert((token, from), available - value);
        *self.token_balances.entry((token, to)).or_default() += value;
        Ok(())
    }
}
