//! Single-owner access control over the paymaster's mutable configuration.
//!
//! The verifier and owner identities live in one explicit configuration
//! struct owned by the paymaster instance and mutated only through the two
//! guarded setters; there is no ambient or global lookup. Ownership can be
//! transferred but never renounced: a null owner would make every owner-only
//! operation permanently unreachable, which this design treats as a safety
//! defect to prevent.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::PaymasterError;

/// The owner-controlled configuration of a paymaster: who may rotate keys and
/// withdraw funds, and which off-chain identity authorizes grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedConfig {
    owner: Address,
    verifier: Address,
}

impl OwnedConfig {
    /// Creates the configuration. Both identities must be non-zero.
    pub fn new(owner: Address, verifier: Address) -> Result<Self, PaymasterError> {
        if owner.is_zero() {
            return Err(PaymasterError::ZeroOwner);
        }
        if verifier.is_zero() {
            return Err(PaymasterError::ZeroVerifier);
        }
        Ok(Self { owner, verifier })
    }

    /// The current owner.
    pub const fn owner(&self) -> Address {
        self.owner
    }

    /// The trusted grant-signing identity.
    pub const fn verifier(&self) -> Address {
        self.verifier
    }

    /// Rejects any caller other than the owner.
    pub fn require_owner(&self, caller: Address) -> Result<(), PaymasterError> {
        if caller != self.owner {
            return Err(PaymasterError::NotOwner { caller });
        }
        Ok(())
    }

    /// Rotates the verifier key. Owner-only; the verifier is never removed
    /// without a replacement, so zero is rejected.
    pub fn set_verifier(
        &mut self,
        caller: Address,
        verifier: Address,
    ) -> Result<(), PaymasterError> {
        self.require_owner(caller)?;
        if verifier.is_zero() {
            return Err(PaymasterError::ZeroVerifier);
        }
        self.verifier = verifier;
        Ok(())
    }

    /// Hands ownership to `new_owner`. Owner-only; zero is rejected.
    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), PaymasterError> {
        self.require_owner(caller)?;
        if new_owner.is_zero() {
            return Err(PaymasterError::ZeroOwner);
        }
        self.owner = new_owner;
        Ok(())
    }

    /// Always fails, even for the owner.
    pub fn renounce_ownership(&self, caller: Address) -> Result<(), PaymasterError> {
        self.require_owner(caller)?;
        Err(PaymasterError::RenounceDisabled)
    }
}
