//! The non-sponsor (V1) paymaster variant.
//!
//! Same approval-based flow and verifier signature as the sponsor variant,
//! but without expiration, nonce window, or vault split: the inner input is
//! the bare 65-byte signature over the basic grant digest, and the payer is
//! always charged the full minimal allowance.

use alloy_primitives::{Address, U256};
use tracing::{debug, error};

use crate::{
    constants::{FEE_COLLECTOR_ADDRESS, SIGNATURE_LENGTH},
    decode_paymaster_input,
    env::ChainEnv,
    error::PaymasterError,
    ownership::OwnedConfig,
    paymaster::{
        owner_withdraw_all_eth, owner_withdraw_erc20, owner_withdraw_erc20_batch,
        owner_withdraw_eth, settle_refund, PaymasterTransaction, ValidationReceipt,
    },
    verify_grant_signature, BasicGrant, PaymasterFlow,
};

/// The V1 paymaster: verifier-signed cost binding, full token charge.
#[derive(Debug, Clone)]
pub struct Erc20Paymaster {
    address: Address,
    config: OwnedConfig,
}

impl Erc20Paymaster {
    /// Creates the paymaster. The verifier and owner must be non-zero.
    pub fn new(
        address: Address,
        owner: Address,
        verifier: Address,
    ) -> Result<Self, PaymasterError> {
        Ok(Self { address, config: OwnedConfig::new(owner, verifier)? })
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

    /// Validates a request and collects the full token fee.
    ///
    /// The inner input must be exactly the 65-byte verifier signature over
    /// the basic grant digest, recomputed from this transaction's actual
    /// destination and cost ceilings.
    pub fn validate_and_pay_for_transaction<E: ChainEnv>(
        &self,
        env: &mut E,
        tx: &PaymasterTransaction,
    ) -> Result<ValidationReceipt, PaymasterError> {
        let flow = decode_paymaster_input(&tx.paymaster_input)?;
        let PaymasterFlow::ApprovalBased { token, minimal_allowance, inner_input } = flow else {
            return Err(PaymasterError::UnsupportedFlow);
        };
        if inner_input.len() != SIGNATURE_LENGTH {
            return Err(PaymasterError::MalformedInput);
        }

        let grant = BasicGrant {
            payer: tx.from,
            to: tx.to,
            fee_token: token,
            minimal_allowance,
            gas_price_ceiling: tx.max_fee_per_gas,
            gas_limit_ceiling: tx.gas_limit,
        };
        let digest = grant.digest();
        verify_grant_signature(grant.signing_hash(), &inner_input, self.config.verifier())?;

        let allowance = env.token_allowance(token, tx.from, self.address);
        if allowance < minimal_allowance {
            return Err(PaymasterError::AllowanceTooLow {
                required: minimal_allowance,
                actual: allowance,
            });
        }
        if env.token_balance_of(token, tx.from) < minimal_allowance {
            return Err(PaymasterError::TokenTransferFailed { token });
        }
        let required_eth = tx.required_eth();
        let available = env.balance_of(self.address);
        if available < required_eth {
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

        env.token_transfer_from(token, self.address, tx.from, self.address, minimal_allowance)?;
        env.transfer(self.address, FEE_COLLECTOR_ADDRESS, required_eth)?;

        debug!(
            target: "paymaster",
            payer = %tx.from,
            %token,
            token_charge = %minimal_allowance,
            advanced = %required_eth,
            "validated transaction"
        );

        Ok(ValidationReceipt {
            digest,
            payer: tx.from,
            token,
            token_charged: minimal_allowance,
            sponsored: U256::ZERO,
            advanced: required_eth,
        })
    }

    /// Settles a completed transaction, refunding the unused fee advance.
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

    /// Sends several token amounts to `to` in one call. Owner-only.
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

#[cfg(test)]
mod tests {
    use alloy_primitives::Bytes;

    use super::*;
    use crate::{
        constants::RATIO_SCALE,
        test_utils::{addr, signer_key, MockChain},
        BasicGrantParams, GrantSigner,
    };

    const PAYMASTER: Address = Address::repeat_byte(0xb0);
    const TOKEN: Address = Address::repeat_byte(0xc0);

    fn setup() -> (MockChain, Erc20Paymaster, GrantSigner) {
        let signer = GrantSigner::new(signer_key(7));
        let paymaster = Erc20Paymaster::new(PAYMASTER, addr(0xee), signer.address()).unwrap();

        let mut env = MockChain::new();
        env.fund(PAYMASTER, U256::from(1_000u64));
        env.mint(TOKEN, addr(1), U256::from(1_000u64));
        (env, paymaster, signer)
    }

    fn issue_tx(signer: &GrantSigner) -> (PaymasterTransaction, U256) {
        let issued = signer
            .issue_basic_grant(&BasicGrantParams {
                payer: addr(1),
                to: addr(2),
                fee_token: TOKEN,
                token_exchange_ratio: RATIO_SCALE,
                gas_price: 1,
                gas_limit: 10,
            })
            .unwrap();
        let tx = PaymasterTransaction {
            from: addr(1),
            to: addr(2),
            gas_limit: 10,
            max_fee_per_gas: 1,
            paymaster_input: issued.paymaster_input,
        };
        (tx, issued.minimal_allowance)
    }

    #[test]
    fn charges_the_full_allowance_and_advances_the_fee() {
        let (mut env, paymaster, signer) = setup();
        let (tx, allowance) = issue_tx(&signer);
        env.approve(TOKEN, addr(1), PAYMASTER, allowance);

        let receipt = paymaster.validate_and_pay_for_transaction(&mut env, &tx).unwrap();
        assert_eq!(receipt.token_charged, U256::from(10u64));
        assert_eq!(receipt.sponsored, U256::ZERO);
        assert_eq!(env.token_balance_of(TOKEN, addr(1)), U256::from(990u64));
        assert_eq!(env.token_balance_of(TOKEN, PAYMASTER), U256::from(10u64));
        assert_eq!(env.balance_of(FEE_COLLECTOR_ADDRESS), U256::from(10u64));
        assert_eq!(env.balance_of(PAYMASTER), U256::from(990u64));
    }

    #[test]
    fn settlement_refunds_the_unused_advance() {
        let (mut env, paymaster, signer) = setup();
        let (tx, allowance) = issue_tx(&signer);
        env.approve(TOKEN, addr(1), PAYMASTER, allowance);

        let receipt = paymaster.validate_and_pay_for_transaction(&mut env, &tx).unwrap();
        let refund = paymaster.post_transaction(&mut env, &tx, &receipt, 6).unwrap();
        assert_eq!(refund, U256::from(4u64));
        assert_eq!(env.balance_of(PAYMASTER), U256::from(994u64));
        assert_eq!(env.balance_of(FEE_COLLECTOR_ADDRESS), U256::from(6u64));
    }

    #[test]
    fn inner_input_must_be_a_bare_signature() {
        let (mut env, paymaster, signer) = setup();
        let (mut tx, allowance) = issue_tx(&signer);
        env.approve(TOKEN, addr(1), PAYMASTER, allowance);

        // Re-wrap the allowance with a 64-byte inner input.
        tx.paymaster_input = crate::encode_approval_based_input(
            TOKEN,
            allowance,
            Bytes::from(vec![0u8; 64]),
        );
        let err = paymaster.validate_and_pay_for_transaction(&mut env, &tx).unwrap_err();
        assert_eq!(err, PaymasterError::MalformedInput);
    }

    #[test]
    fn tampered_cost_fields_break_the_signature() {
        let (mut env, paymaster, signer) = setup();
        let (mut tx, allowance) = issue_tx(&signer);
        env.approve(TOKEN, addr(1), PAYMASTER, allowance);

        tx.gas_limit = 11;
        let err = paymaster.validate_and_pay_for_transaction(&mut env, &tx).unwrap_err();
        assert_eq!(err, PaymasterError::InvalidSignature);
    }

    #[test]
    fn missing_allowance_is_rejected_before_any_transfer() {
        let (mut env, paymaster, signer) = setup();
        let (tx, allowance) = issue_tx(&signer);
        env.approve(TOKEN, addr(1), PAYMASTER, allowance - U256::from(1u64));

        let err = paymaster.validate_and_pay_for_transaction(&mut env, &tx).unwrap_err();
        assert_eq!(
            err,
            PaymasterError::AllowanceTooLow {
                required: allowance,
                actual: allowance - U256::from(1u64)
            }
        );
        assert_eq!(env.token_balance_of(TOKEN, addr(1)), U256::from(1_000u64));
        assert_eq!(env.balance_of(PAYMASTER), U256::from(1_000u64));
    }

    #[test]
    fn owner_surface_matches_the_sponsor_variant() {
        let (mut env, mut paymaster, _) = setup();
        assert_eq!(
            paymaster.set_verifier(addr(9), addr(3)).unwrap_err(),
            PaymasterError::NotOwner { caller: addr(9) }
        );
        assert_eq!(
            paymaster.renounce_ownership(addr(0xee)).unwrap_err(),
            PaymasterError::RenounceDisabled
        );
        paymaster.transfer_ownership(addr(0xee), addr(0xef)).unwrap();
        paymaster.withdraw_all_eth(&mut env, addr(0xef), addr(5)).unwrap();
        assert_eq!(env.balance_of(addr(5)), U256::from(1_000u64));
    }
}
