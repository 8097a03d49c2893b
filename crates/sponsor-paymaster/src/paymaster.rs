//! The paymaster core: the validation state machine that turns a signed
//! sponsorship grant into a token fee collection and a native fee advance.
//!
//! Validation is a single serialized step per transaction: decode, recompute
//! the digest against the transaction's actual destination and cost, verify
//! the verifier signature, check the temporal bounds, then settle the fee.
//! Every fallible check happens before the first state mutation, so a
//! rejected transaction leaves no trace.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{
    check_expiration, check_nonce_window,
    constants::{FEE_COLLECTOR_ADDRESS, MAX_SPONSORSHIP_RATIO},
    decode_paymaster_input,
    env::ChainEnv,
    error::PaymasterError,
    grant_signing_hash,
    ownership::OwnedConfig,
    vault::SponsorshipVault,
    verify_grant_signature, PaymasterFlow, ReplayProtection, SpentGrants, SponsorGrant,
    SponsorGrantInput,
};

/// The slice of an incoming transaction the paymaster validates against: the
/// payer, the actual destination and cost ceilings, and the attached
/// paymaster input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymasterTransaction {
    /// The account being sponsored.
    pub from: Address,
    /// The transaction's destination.
    pub to: Address,
    /// The transaction's gas limit.
    pub gas_limit: u64,
    /// The transaction's gas price.
    pub max_fee_per_gas: u128,
    /// The encoded paymaster flow and grant data.
    pub paymaster_input: Bytes,
}

impl PaymasterTransaction {
    /// The native cost ceiling of this transaction:
    /// `gas_limit × max_fee_per_gas`.
    pub fn required_eth(&self) -> U256 {
        U256::from(self.gas_limit) * U256::from(self.max_fee_per_gas)
    }
}

/// The outcome of a successful validation, consumed by the settlement step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReceipt {
    /// The grant digest this validation consumed.
    pub digest: B256,
    /// The sponsored account.
    pub payer: Address,
    /// The fee token.
    pub token: Address,
    /// Tokens pulled from the payer.
    pub token_charged: U256,
    /// Native currency drawn from the vault depositor.
    pub sponsored: U256,
    /// Native currency advanced to the fee collector.
    pub advanced: U256,
}

/// The sponsor-variant paymaster: validates grants, splits fees between the
/// payer and a vault depositor, and advances the native fee.
#[derive(Debug, Clone)]
pub struct SponsorPaymaster {
    address: Address,
    config: OwnedConfig,
    vault: Option<Address>,
    replay: ReplayProtection,
    spent: SpentGrants,
}

impl SponsorPaymaster {
    /// Creates a paymaster with no vault bound. The verifier and owner must
    /// be non-zero.
    pub fn new(
        address: Address,
        owner: Address,
        verifier: Address,
    ) -> Result<Self, PaymasterError> {
        Ok(Self {
            address,
            config: OwnedConfig::new(owner, verifier)?,
            vault: None,
            replay: ReplayProtection::default(),
            spent: SpentGrants::default(),
        })
    }

    /// Switches the replay-protection mode. [`ReplayProtection::SingleUse`]
    /// additionally consumes each grant digest on first validation.
    pub fn with_replay_protection(mut self, replay: ReplayProtection) -> Self {
        self.replay = replay;
        self
    }

    /// The paymaster's own account.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The current owner.
    pub const fn owner(&self) -> Address {
        self.config.owner()
    }

    /// The trusted grant-signing identity.
    pub const fn verifier(&self) -> Address {
        self.config.verifier()
    }

    /// The bound vault, if any.
    pub const fn vault(&self) -> Option<Address> {
        self.vault
    }

    /// The active replay-protection mode.
    pub const fn replay_protection(&self) -> ReplayProtection {
        self.replay
    }

    /// Binds the sponsorship vault. Owner-only; zero is rejected.
    pub fn set_vault(&mut self, caller: Address, vault: Address) -> Result<(), PaymasterError> {
        self.config.require_owner(caller)?;
        if vault.is_zero() {
            return Err(PaymasterError::ZeroVault);
        }
        self.vault = Some(vault);
        Ok(())
    }

    /// Rotates the verifier key. Owner-only; zero is rejected.
    pub fn set_verifier(
        &mut self,
        caller: Address,
        verifier: Address,
    ) -> Result<(), PaymasterError> {
        self.config.set_verifier(caller, verifier)
    }

    /// Hands ownership to `new_owner`. Owner-only; zero is rejected.
    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), PaymasterError> {
        self.config.transfer_ownership(caller, new_owner)
    }

    /// Always fails; a paymaster without an owner would strand its funds.
    pub fn renounce_ownership(&self, caller: Address) -> Result<(), PaymasterError> {
        self.config.renounce_ownership(caller)
    }

    /// Validates a sponsorship request and collects the fee.
    ///
    /// Runs the full state machine: flow decode, grant decode, digest
    /// recomputation bound to this transaction's `to`/`max_fee_per_gas`/
    /// `gas_limit`, signature verification, expiration and nonce-window
    /// checks, allowance check, then the fee split. If the grant names a
    /// vault depositor, that depositor's share of the native cost is drawn
    /// through [`SponsorshipVault::get_sponsorship`] and the payer is charged
    /// only the complementary token share; a vault shortfall fails the whole
    /// validation rather than silently charging the payer in full.
    pub fn validate_and_pay_for_transaction<E: ChainEnv>(
        &mut self,
        env: &mut E,
        vault: Option<&mut SponsorshipVault>,
        tx: &PaymasterTransaction,
    ) -> Result<ValidationReceipt, PaymasterError> {
        // Decode: only the approval-based flow is supported.
        let flow = decode_paymaster_input(&tx.paymaster_input)?;
        let PaymasterFlow::ApprovalBased { token, minimal_allowance, inner_input } = flow else {
            return Err(PaymasterError::UnsupportedFlow);
        };
        let grant_input = SponsorGrantInput::decode(&inner_input)?;
        if grant_input.sponsorship_ratio > MAX_SPONSORSHIP_RATIO {
            return Err(PaymasterError::InvalidRatio { ratio: grant_input.sponsorship_ratio });
        }

        // Recompute the digest from the transaction's actual fields; the
        // grant is bound to this specific cost, not merely to the payer.
        let grant = SponsorGrant {
            payer: tx.from,
            to: tx.to,
            fee_token: token,
            minimal_allowance,
            expiration: grant_input.expiration,
            max_nonce: grant_input.max_nonce,
            protocol_address: grant_input.protocol_address,
            sponsorship_ratio: grant_input.sponsorship_ratio,
            gas_price_ceiling: tx.max_fee_per_gas,
            gas_limit_ceiling: tx.gas_limit,
        };
        let digest = grant.digest();
        verify_grant_signature(
            grant_signing_hash(digest),
            &grant_input.signature,
            self.config.verifier(),
        )?;

        check_expiration(env.timestamp(), grant_input.expiration)?;
        check_nonce_window(env.nonce_of(tx.from), grant_input.max_nonce)?;
        if self.replay == ReplayProtection::SingleUse && self.spent.is_spent(digest) {
            return Err(PaymasterError::GrantAlreadyUsed { digest });
        }

        // Allowance is checked before any transfer is attempted.
        let allowance = env.token_allowance(token, tx.from, self.address);
        if allowance < minimal_allowance {
            return Err(PaymasterError::AllowanceTooLow {
                required: minimal_allowance,
                actual: allowance,
            });
        }

        // Fee split. A sponsor is named only if the grant carries a non-zero
        // protocol address and a vault is bound.
        let required_eth = tx.required_eth();
        let ratio = U256::from(grant_input.sponsorship_ratio);
        let scale = U256::from(MAX_SPONSORSHIP_RATIO);
        let sponsor_active = !grant_input.protocol_address.is_zero() && self.vault.is_some();
        let (sponsored, token_charge) = if sponsor_active {
            (required_eth * ratio / scale, minimal_allowance * (scale - ratio) / scale)
        } else {
            (U256::ZERO, minimal_allowance)
        };

        let vault = if sponsor_active {
            let bound = self.vault.unwrap_or_default();
            match vault {
                Some(vault) if vault.address() == bound => Some(vault),
                Some(vault) => {
                    return Err(PaymasterError::VaultMismatch {
                        expected: bound,
                        actual: vault.address(),
                    })
                }
                None => {
                    return Err(PaymasterError::VaultMismatch {
                        expected: bound,
                        actual: Address::ZERO,
                    })
                }
            }
        } else {
            None
        };

        // Remaining preconditions, checked before the first mutation so a
        // failure leaves every balance untouched.
        let payer_tokens = env.token_balance_of(token, tx.from);
        if payer_tokens < token_charge {
            return Err(PaymasterError::TokenTransferFailed { token });
        }
        let available = env.balance_of(self.address);
        if available + sponsored < required_eth {
            error!(
                target: "paymaster",
                required = %required_eth,
                available = %available,
                "paymaster balance cannot cover the fee advance"
            );
            return Err(PaymasterError::InsufficientPaymasterBalance {
                required: required_eth,
                available,
            });
        }

        // Draw the sponsor's share. This is the only fallible step once
        // mutations begin, and it checks before it debits.
        if let Some(vault) = vault {
            vault.get_sponsorship(env, self.address, grant_input.protocol_address, sponsored)?;
        }

        // Pull the payer's token share.
        if !token_charge.is_zero() {
            env.token_transfer_from(token, self.address, tx.from, self.address, token_charge)?;
        }

        // Advance the native fee up front.
        env.transfer(self.address, FEE_COLLECTOR_ADDRESS, required_eth)?;

        if self.replay == ReplayProtection::SingleUse {
            self.spent.mark_spent(digest);
        }

        debug!(
            target: "paymaster",
            payer = %tx.from,
            %token,
            %token_charge,
            %sponsored,
            advanced = %required_eth,
            "validated sponsored transaction"
        );

        Ok(ValidationReceipt {
            digest,
            payer: tx.from,
            token,
            token_charged: token_charge,
            sponsored,
            advanced: required_eth,
        })
    }

    /// Settles a completed transaction: the unused part of the advanced fee
    /// returns from the fee collector to the paymaster's balance.
    pub fn post_transaction<E: ChainEnv>(
        &self,
        env: &mut E,
        tx: &PaymasterTransaction,
        receipt: &ValidationReceipt,
        gas_used: u64,
    ) -> Result<U256, PaymasterError> {
        settle_refund(env, self.address, tx, receipt, gas_used)
    }

    /// Sends `amount` of the paymaster's native balance to `to`. Owner-only.
    pub fn withdraw_eth<E: ChainEnv>(
        &self,
        env: &mut E,
        caller: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), PaymasterError> {
        owner_withdraw_eth(env, &self.config, self.address, caller, to, amount)
    }

    /// Sends the paymaster's entire native balance to `to`. Owner-only.
    pub fn withdraw_all_eth<E: ChainEnv>(
        &self,
        env: &mut E,
        caller: Address,
        to: Address,
    ) -> Result<U256, PaymasterError> {
        owner_withdraw_all_eth(env, &self.config, self.address, caller, to)
    }

    /// Sends `amount` of `token` held by the paymaster to `to`. Owner-only.
    pub fn withdraw_erc20<E: ChainEnv>(
        &self,
        env: &mut E,
        caller: Address,
        to: Address,
        token: Address,
        amount: U256,
    ) -> Result<(), PaymasterError> {
        owner_withdraw_erc20(env, &self.config, self.address, caller, to, token, amount)
    }

    /// Sends several token amounts to `to` in one call. The arrays are
    /// parallel; a length mismatch is a hard reject before any transfer.
    /// Owner-only.
    pub fn withdraw_erc20_batch<E: ChainEnv>(
        &self,
        env: &mut E,
        caller: Address,
        to: Address,
        tokens: &[Address],
        amounts: &[U256],
    ) -> Result<(), PaymasterError> {
        owner_withdraw_erc20_batch(env, &self.config, self.address, caller, to, tokens, amounts)
    }
}

pub(crate) fn settle_refund<E: ChainEnv>(
    env: &mut E,
    paymaster: Address,
    tx: &PaymasterTransaction,
    receipt: &ValidationReceipt,
    gas_used: u64,
) -> Result<U256, PaymasterError> {
    let used = U256::from(gas_used.min(tx.gas_limit)) * U256::from(tx.max_fee_per_gas);
    let refund = receipt.advanced.saturating_sub(used);
    if !refund.is_zero() {
        env.transfer(FEE_COLLECTOR_ADDRESS, paymaster, refund)?;
    }
    Ok(refund)
}

pub(crate) fn owner_withdraw_eth<E: ChainEnv>(
    env: &mut E,
    config: &OwnedConfig,
    from: Address,
    caller: Address,
    to: Address,
    amount: U256,
) -> Result<(), PaymasterError> {
    config.require_owner(caller)?;
    env.transfer(from, to, amount)?;
    Ok(())
}

pub(crate) fn owner_withdraw_all_eth<E: ChainEnv>(
    env: &mut E,
    config: &OwnedConfig,
    from: Address,
    caller: Address,
    to: Address,
) -> Result<U256, PaymasterError> {
    config.require_owner(caller)?;
    let amount = env.balance_of(from);
    env.transfer(from, to, amount)?;
    Ok(amount)
}

pub(crate) fn owner_withdraw_erc20<E: ChainEnv>(
    env: &mut E,
    config: &OwnedConfig,
    from: Address,
    caller: Address,
    to: Address,
    token: Address,
    amount: U256,
) -> Result<(), PaymasterError> {
    config.require_owner(caller)?;
    env.token_transfer(token, from, to, amount)?;
    Ok(())
}

pub(crate) fn owner_withdraw_erc20_batch<E: ChainEnv>(
    env: &mut E,
    config: &OwnedConfig,
    from: Address,
    caller: Address,
    to: Address,
    tokens: &[Address],
    amounts: &[U256],
) -> Result<(), PaymasterError> {
    config.require_owner(caller)?;
    if tokens.len() != amounts.len() {
        return Err(PaymasterError::LengthMismatch {
            tokens: tokens.len(),
            amounts: amounts.len(),
        });
    }
    for (token, amount) in tokens.iter().zip(amounts) {
        env.token_transfer(*token, from, to, *amount)?;
    }
    Ok(())
}
