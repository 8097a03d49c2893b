//! Canonical encoding and hashing of sponsorship grants.
//!
//! A grant digest binds every field that affects the cost or the recipient of
//! a sponsored transaction; omitting any field from the digest would be a
//! forgery vector. The digest is keccak256 over a tightly packed, fixed-width
//! field tuple, and the off-chain verifier signs its EIP-191 wrap.
//!
//! Field order and widths are part of the wire protocol: any change is a
//! protocol-breaking change and must be versioned.

use alloy_primitives::{eip191_hash_message, keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolInterface, SolValue};

use crate::error::PaymasterError;

sol! {
    /// The two paymaster flows a transaction can request. This is a closed
    /// set: the approval-based flow is the only supported one, and the
    /// general (no-allowance) flow is always rejected during validation.
    interface IPaymasterFlow {
        function approvalBased(address token, uint256 minAllowance, bytes innerInput);
        function general(bytes input);
    }
}

/// A decoded paymaster input. Exactly two flows exist; there is intentionally
/// no room for a third flow to be added without revisiting the digest binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymasterFlow {
    /// The payer has pre-approved a token allowance to the paymaster. The
    /// `minimal_allowance` is both the fee ceiling the verifier signed off on
    /// and a hard ceiling on what validation may extract.
    ApprovalBased {
        /// Token used to pay the equivalent fee.
        token: Address,
        /// Smallest allowance the payer must have approved to the paymaster.
        minimal_allowance: U256,
        /// Variable-length trailing data (grant fields and signature).
        inner_input: Bytes,
    },
    /// The allowance-free flow. Decoded so the rejection is explicit, never
    /// supported.
    General {
        /// Opaque input of the general flow.
        inner_input: Bytes,
    },
}

/// Decodes a paymaster input blob into one of the two known flows.
///
/// An unknown selector or structurally malformed calldata fails closed with
/// [`PaymasterError::MalformedInput`]; it never defaults to "unsponsored".
pub fn decode_paymaster_input(input: &[u8]) -> Result<PaymasterFlow, PaymasterError> {
    let call = IPaymasterFlow::IPaymasterFlowCalls::abi_decode(input, true)
        .map_err(|_| PaymasterError::MalformedInput)?;
    Ok(match call {
        IPaymasterFlow::IPaymasterFlowCalls::approvalBased(call) => PaymasterFlow::ApprovalBased {
            token: call.token,
            minimal_allowance: call.minAllowance,
            inner_input: call.innerInput,
        },
        IPaymasterFlow::IPaymasterFlowCalls::general(call) => {
            PaymasterFlow::General { inner_input: call.input }
        }
    })
}

/// Encodes an approval-based paymaster input (the signer-service side of
/// [`decode_paymaster_input`]).
pub fn encode_approval_based_input(
    token: Address,
    minimal_allowance: U256,
    inner_input: Bytes,
) -> Bytes {
    IPaymasterFlow::approvalBasedCall { token, minAllowance: minimal_allowance, innerInput: inner_input }
        .abi_encode()
        .into()
}

/// Encodes a general-flow paymaster input. Only useful to exercise the
/// rejection path; the flow is never validated.
pub fn encode_general_input(inner_input: Bytes) -> Bytes {
    IPaymasterFlow::generalCall { input: inner_input }.abi_encode().into()
}

/// The grant fields carried in the approval-based inner input of the sponsor
/// variant, ABI-encoded as
/// `(uint64 expiration, uint256 maxNonce, address protocolAddress,
/// uint16 sponsorshipRatio, bytes signature)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsorGrantInput {
    /// Absolute timestamp after which the grant is void.
    pub expiration: u64,
    /// Upper bound on the payer's on-chain nonce (validity window).
    pub max_nonce: U256,
    /// The vault depositor subsidizing this transaction; zero means the payer
    /// pays in full.
    pub protocol_address: Address,
    /// Basis points of the fee the protocol covers.
    pub sponsorship_ratio: u16,
    /// Verifier signature over the grant's signing hash.
    pub signature: Bytes,
}

impl SponsorGrantInput {
    /// Decodes the inner input. Structural failure (wrong length, wrong
    /// types) rejects the whole validation.
    pub fn decode(data: &[u8]) -> Result<Self, PaymasterError> {
        let (expiration, max_nonce, protocol_address, sponsorship_ratio, signature) =
            <(u64, U256, Address, u16, Bytes)>::abi_decode_params(data, true)
                .map_err(|_| PaymasterError::MalformedInput)?;
        Ok(Self { expiration, max_nonce, protocol_address, sponsorship_ratio, signature })
    }

    /// ABI-encodes the inner input.
    pub fn encode(&self) -> Bytes {
        (
            self.expiration,
            self.max_nonce,
            self.protocol_address,
            self.sponsorship_ratio,
            self.signature.clone(),
        )
            .abi_encode_params()
            .into()
    }
}

/// A fully reconstructed sponsor-variant grant: the caller-supplied fields
/// plus the transaction's actual destination and cost ceilings. Not a
/// persisted record; rebuilt per request so the digest always reflects what
/// the transaction will really cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsorGrant {
    /// The sponsored account.
    pub payer: Address,
    /// The transaction's destination.
    pub to: Address,
    /// Token used to pay the equivalent fee.
    pub fee_token: Address,
    /// Smallest token allowance the payer must have approved.
    pub minimal_allowance: U256,
    /// Absolute expiration timestamp.
    pub expiration: u64,
    /// Nonce validity-window bound.
    pub max_nonce: U256,
    /// The subsidizing vault depositor; zero for none.
    pub protocol_address: Address,
    /// Basis points of the fee the protocol covers.
    pub sponsorship_ratio: u16,
    /// Gas price the grant was priced against.
    pub gas_price_ceiling: u128,
    /// Gas limit the grant was priced against.
    pub gas_limit_ceiling: u64,
}

/// Packed preimage length of a sponsor grant digest: four addresses, two
/// `uint256`, the `uint64` expiration, the `uint16` ratio, and two `uint256`
/// gas ceilings.
const SPONSOR_PREIMAGE_LEN: usize = 20 * 4 + 32 * 2 + 8 + 2 + 32 * 2;

impl SponsorGrant {
    /// Computes the grant digest: keccak256 over the tightly packed tuple
    /// `(payer, to, feeToken, minimalAllowance, expiration, maxNonce,
    /// protocolAddress, sponsorshipRatio, gasPriceCeiling, gasLimitCeiling)`.
    ///
    /// Widths are fixed (addresses 20 bytes, `uint256` 32 bytes big-endian,
    /// `uint64` 8 bytes, `uint16` 2 bytes), so no two distinct field tuples
    /// share a preimage.
    pub fn digest(&self) -> B256 {
        let mut buf = Vec::with_capacity(SPONSOR_PREIMAGE_LEN);
        buf.extend_from_slice(self.payer.as_slice());
        buf.extend_from_slice(self.to.as_slice());
        buf.extend_from_slice(self.fee_token.as_slice());
        buf.extend_from_slice(&self.minimal_allowance.to_be_bytes::<32>());
        buf.extend_from_slice(&self.expiration.to_be_bytes());
        buf.extend_from_slice(&self.max_nonce.to_be_bytes::<32>());
        buf.extend_from_slice(self.protocol_address.as_slice());
        buf.extend_from_slice(&self.sponsorship_ratio.to_be_bytes());
        buf.extend_from_slice(&U256::from(self.gas_price_ceiling).to_be_bytes::<32>());
        buf.extend_from_slice(&U256::from(self.gas_limit_ceiling).to_be_bytes::<32>());
        debug_assert_eq!(buf.len(), SPONSOR_PREIMAGE_LEN);
        keccak256(&buf)
    }

    /// The hash the verifier actually signs: the EIP-191 personal-message
    /// wrap of [`Self::digest`].
    pub fn signing_hash(&self) -> B256 {
        grant_signing_hash(self.digest())
    }
}

/// The non-sponsor (V1) grant: no expiration, nonce window or vault fields,
/// just the cost binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicGrant {
    /// The sponsored account.
    pub payer: Address,
    /// The transaction's destination.
    pub to: Address,
    /// Token used to pay the equivalent fee.
    pub fee_token: Address,
    /// Smallest token allowance the payer must have approved.
    pub minimal_allowance: U256,
    /// Gas price the grant was priced against.
    pub gas_price_ceiling: u128,
    /// Gas limit the grant was priced against.
    pub gas_limit_ceiling: u64,
}

const BASIC_PREIMAGE_LEN: usize = 20 * 3 + 32 * 3;

impl BasicGrant {
    /// keccak256 over the packed tuple
    /// `(payer, to, feeToken, minimalAllowance, gasPrice, gasLimit)`.
    pub fn digest(&self) -> B256 {
        let mut buf = Vec::with_capacity(BASIC_PREIMAGE_LEN);
        buf.extend_from_slice(self.payer.as_slice());
        buf.extend_from_slice(self.to.as_slice());
        buf.extend_from_slice(self.fee_token.as_slice());
        buf.extend_from_slice(&self.minimal_allowance.to_be_bytes::<32>());
        buf.extend_from_slice(&U256::from(self.gas_price_ceiling).to_be_bytes::<32>());
        buf.extend_from_slice(&U256::from(self.gas_limit_ceiling).to_be_bytes::<32>());
        debug_assert_eq!(buf.len(), BASIC_PREIMAGE_LEN);
        keccak256(&buf)
    }

    /// The EIP-191 wrap of [`Self::digest`].
    pub fn signing_hash(&self) -> B256 {
        grant_signing_hash(self.digest())
    }
}

/// Wraps a grant digest in the EIP-191 personal-message envelope
/// (`"\x19Ethereum Signed Message:\n32" ‖ digest`), matching what an off-chain
/// wallet produces when asked to sign the raw digest bytes.
pub fn grant_signing_hash(digest: B256) -> B256 {
    eip191_hash_message(digest)
}
