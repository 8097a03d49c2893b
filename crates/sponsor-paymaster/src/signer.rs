//! The off-chain side of the protocol: pricing a grant and signing its
//! digest with the verifier key.
//!
//! This is what a sponsorship API service runs. Given a transaction's cost
//! ceilings and a token exchange ratio it computes the minimal allowance,
//! builds the grant, signs the EIP-191 wrap of its digest, and assembles the
//! exact paymaster input bytes the transaction must carry.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use k256::ecdsa::SigningKey;

use crate::{
    constants::{RATIO_SCALE, SIGNATURE_LENGTH},
    encode_approval_based_input, grant_signing_hash, BasicGrant, SponsorGrant, SponsorGrantInput,
};

/// Everything a sponsor-variant grant is priced and bound against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsorGrantParams {
    /// The sponsored account.
    pub payer: Address,
    /// The transaction's destination.
    pub to: Address,
    /// Token used to pay the equivalent fee.
    pub fee_token: Address,
    /// Token units per native unit, scaled by [`RATIO_SCALE`].
    pub token_exchange_ratio: u64,
    /// Absolute expiration timestamp.
    pub expiration: u64,
    /// Nonce validity-window bound.
    pub max_nonce: U256,
    /// The subsidizing vault depositor; zero for none.
    pub protocol_address: Address,
    /// Basis points of the fee the protocol covers.
    pub sponsorship_ratio: u16,
    /// Gas price the grant is priced against.
    pub gas_price: u128,
    /// Gas limit the grant is priced against.
    pub gas_limit: u64,
}

/// Pricing and binding inputs of a non-sponsor (V1) grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicGrantParams {
    /// The sponsored account.
    pub payer: Address,
    /// The transaction's destination.
    pub to: Address,
    /// Token used to pay the equivalent fee.
    pub fee_token: Address,
    /// Token units per native unit, scaled by [`RATIO_SCALE`].
    pub token_exchange_ratio: u64,
    /// Gas price the grant is priced against.
    pub gas_price: u128,
    /// Gas limit the grant is priced against.
    pub gas_limit: u64,
}

/// A priced and signed grant, ready to attach to a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedGrant {
    /// The allowance the payer must approve to the paymaster.
    pub minimal_allowance: U256,
    /// The complete approval-based paymaster input bytes.
    pub paymaster_input: Bytes,
    /// The verifier signature carried inside `paymaster_input`.
    pub signature: Bytes,
}

/// Holds the verifier's signing key and issues grants with it.
#[derive(Clone)]
pub struct GrantSigner {
    key: SigningKey,
}

impl core::fmt::Debug for GrantSigner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GrantSigner").field("address", &self.address()).finish_non_exhaustive()
    }
}

impl GrantSigner {
    /// Wraps an existing signing key.
    pub const fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Builds a signer from a raw 32-byte scalar.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, k256::ecdsa::Error> {
        Ok(Self { key: SigningKey::from_slice(bytes)? })
    }

    /// The verifier address this signer's grants recover to.
    pub fn address(&self) -> Address {
        let point = self.key.verifying_key().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        Address::from_slice(&hash[12..])
    }

    /// Signs the EIP-191 wrap of `digest`, returning the 65-byte
    /// `r ‖ s ‖ v` form with `v` in the 27/28 convention.
    pub fn sign_digest(&self, digest: B256) -> Result<[u8; SIGNATURE_LENGTH], k256::ecdsa::Error> {
        let signing_hash = grant_signing_hash(digest);
        let (signature, recovery_id) = self.key.sign_prehash_recoverable(signing_hash.as_slice())?;
        let mut out = [0u8; SIGNATURE_LENGTH];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = 27 + recovery_id.to_byte();
        Ok(out)
    }

    /// Prices and signs a sponsor-variant grant.
    ///
    /// The minimal allowance is the native cost ceiling converted into the
    /// fee token:
    /// `gas_limit × gas_price × token_exchange_ratio / RATIO_SCALE`.
    pub fn issue_sponsor_grant(
        &self,
        params: &SponsorGrantParams,
    ) -> Result<IssuedGrant, k256::ecdsa::Error> {
        let minimal_allowance = minimal_allowance(
            params.gas_limit,
            params.gas_price,
            params.token_exchange_ratio,
        );
        let grant = SponsorGrant {
            payer: params.payer,
            to: params.to,
            fee_token: params.fee_token,
            minimal_allowance,
            expiration: params.expiration,
            max_nonce: params.max_nonce,
            protocol_address: params.protocol_address,
            sponsorship_ratio: params.sponsorship_ratio,
            gas_price_ceiling: params.gas_price,
            gas_limit_ceiling: params.gas_limit,
        };
        let signature = Bytes::copy_from_slice(&self.sign_digest(grant.digest())?);

        let inner = SponsorGrantInput {
            expiration: params.expiration,
            max_nonce: params.max_nonce,
            protocol_address: params.protocol_address,
            sponsorship_ratio: params.sponsorship_ratio,
            signature: signature.clone(),
        }
        .encode();
        let paymaster_input =
            encode_approval_based_input(params.fee_token, minimal_allowance, inner);

        Ok(IssuedGrant { minimal_allowance, paymaster_input, signature })
    }

    /// Prices and signs a non-sponsor (V1) grant. The inner input is the bare
    /// 65-byte signature.
    pub fn issue_basic_grant(
        &self,
        params: &BasicGrantParams,
    ) -> Result<IssuedGrant, k256::ecdsa::Error> {
        let minimal_allowance = minimal_allowance(
            params.gas_limit,
            params.gas_price,
            params.token_exchange_ratio,
        );
        let grant = BasicGrant {
            payer: params.payer,
            to: params.to,
            fee_token: params.fee_token,
            minimal_allowance,
            gas_price_ceiling: params.gas_price,
            gas_limit_ceiling: params.gas_limit,
        };
        let signature = Bytes::copy_from_slice(&self.sign_digest(grant.digest())?);
        let paymaster_input =
            encode_approval_based_input(params.fee_token, minimal_allowance, signature.clone());

        Ok(IssuedGrant { minimal_allowance, paymaster_input, signature })
    }
}

/// Converts a native cost ceiling into the fee token at the given exchange
/// ratio, rounding down.
pub fn minimal_allowance(gas_limit: u64, gas_price: u128, token_exchange_ratio: u64) -> U256 {
    U256::from(gas_limit) * U256::from(gas_price) * U256::from(token_exchange_ratio)
        / U256::from(RATIO_SCALE)
}
