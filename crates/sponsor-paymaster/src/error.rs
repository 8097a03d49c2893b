//! Error types for grant validation and the paymaster's owner surface.
//!
//! Every rejection carries a stable, machine-readable code: the Rust enums
//! below map one-to-one onto Solidity-style errors whose 4-byte selectors are
//! the wire form, so calling infrastructure can branch on the failure without
//! parsing strings.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolError};

use crate::{env::EnvError, vault::VaultError};

sol! {
    /// Machine-readable rejection codes of the paymaster protocol.
    interface IPaymasterErrors {
        error UnsupportedFlow();
        error MalformedInput();
        error InvalidRatio(uint16 ratio);
        error InvalidSignature();
        error Expired(uint64 expiration, uint64 current);
        error NonceWindowExceeded(uint256 maxNonce, uint64 currentNonce);
        error GrantAlreadyUsed(bytes32 digest);
        error AllowanceTooLow(uint256 required, uint256 actual);
        error TokenTransferFailed(address token);
        error Unauthorized();
        error InsufficientBalance(uint256 requested, uint256 available);
        error InsufficientPaymasterBalance(uint256 required, uint256 available);
        error NotOwner(address caller);
        error ZeroAddress();
        error RenounceDisabled();
        error LengthMismatch(uint256 tokens, uint256 amounts);
        error VaultMismatch(address expected, address actual);
    }
}

/// The broad failure classes of the protocol. Off-chain callers branch on
/// this to decide whether to re-request a grant (temporal), top up funds or
/// allowance (funds), or treat the attempt as permanently invalid
/// (auth/protocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing signature, wrong verifier.
    AuthFailure,
    /// Expired grant or exhausted nonce/replay window.
    TemporalFailure,
    /// Allowance, token balance, vault or paymaster balance insufficient.
    FundsFailure,
    /// A caller lacked the required capability (non-owner, non-paymaster).
    AuthorizationFailure,
    /// Unsupported flow or malformed encoding.
    ProtocolFailure,
}

/// A grant-validation or owner-operation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymasterError {
    /// The transaction requested the general (no-allowance) flow, which is
    /// permanently unsupported: sponsorship requires an explicit allowance so
    /// `minimalAllowance` can act as a hard extraction ceiling.
    #[error("unsupported paymaster flow")]
    UnsupportedFlow,
    /// The paymaster input or the trailing grant fields failed to decode.
    #[error("malformed paymaster input")]
    MalformedInput,
    /// The sponsorship ratio exceeds 10000 basis points.
    #[error("invalid sponsorship ratio: {ratio}")]
    InvalidRatio {
        /// The out-of-range ratio.
        ratio: u16,
    },
    /// The signature is malformed, or recovers to an identity other than the
    /// configured verifier. The two cases are deliberately indistinguishable.
    #[error("invalid grant signature")]
    InvalidSignature,
    /// The grant's expiration has passed.
    #[error("grant expired at {expiration}, current time {now}")]
    Expired {
        /// The grant's absolute expiration timestamp.
        expiration: u64,
        /// The current timestamp.
        now: u64,
    },
    /// The payer's nonce has left the grant's validity window.
    #[error("nonce window exceeded: max={max_nonce} current={current_nonce}")]
    NonceWindowExceeded {
        /// The grant's nonce bound.
        max_nonce: U256,
        /// The payer's current on-chain nonce.
        current_nonce: u64,
    },
    /// Single-use mode: this grant digest was already consumed.
    #[error("grant {digest} already used")]
    GrantAlreadyUsed {
        /// The spent grant digest.
        digest: B256,
    },
    /// The payer's approved allowance is below the grant's minimum.
    #[error("allowance too low: required={required} actual={actual}")]
    AllowanceTooLow {
        /// The grant's `minimalAllowance`.
        required: U256,
        /// The payer's actual approval.
        actual: U256,
    },
    /// The token fee could not be pulled from the payer.
    #[error("token fee transfer failed for {token}")]
    TokenTransferFailed {
        /// The fee token.
        token: Address,
    },
    /// The sponsorship vault rejected the subsidy draw.
    #[error(transparent)]
    Vault(#[from] VaultError),
    /// The paymaster's own balance cannot cover the native fee advance. This
    /// is an operational configuration error, not a payer-correctable one.
    #[error("paymaster balance too low: required={required} available={available}")]
    InsufficientPaymasterBalance {
        /// The native amount to advance.
        required: U256,
        /// The paymaster's balance.
        available: U256,
    },
    /// An owner-only operation was called by a non-owner.
    #[error("caller {caller} is not the owner")]
    NotOwner {
        /// The rejected caller.
        caller: Address,
    },
    /// The verifier identity may never be zero.
    #[error("verifier cannot be the zero address")]
    ZeroVerifier,
    /// Ownership may never be transferred to the zero identity.
    #[error("owner cannot be the zero address")]
    ZeroOwner,
    /// The vault binding may not be the zero identity.
    #[error("vault cannot be the zero address")]
    ZeroVault,
    /// Renouncing ownership is disabled: a null owner would permanently
    /// strand funds and verifier rotation.
    #[error("renouncing ownership is disabled")]
    RenounceDisabled,
    /// Batch withdrawal arrays differ in length.
    #[error("batch length mismatch: {tokens} tokens vs {amounts} amounts")]
    LengthMismatch {
        /// Number of token entries.
        tokens: usize,
        /// Number of amount entries.
        amounts: usize,
    },
    /// The vault handed to validation is not the one bound to the paymaster.
    #[error("vault mismatch: bound={expected} provided={actual}")]
    VaultMismatch {
        /// The bound vault address.
        expected: Address,
        /// The provided vault's address.
        actual: Address,
    },
    /// A value movement failed in the chain environment.
    #[error(transparent)]
    Env(#[from] EnvError),
}

impl PaymasterError {
    /// The broad failure class of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSignature => ErrorKind::AuthFailure,
            Self::Expired { .. } |
            Self::NonceWindowExceeded { .. } |
            Self::GrantAlreadyUsed { .. } => ErrorKind::TemporalFailure,
            Self::AllowanceTooLow { .. } |
            Self::TokenTransferFailed { .. } |
            Self::InsufficientPaymasterBalance { .. } |
            Self::Vault(
                VaultError::InsufficientBalance { .. } | VaultError::Transfer(_),
            ) |
            Self::Env(_) => ErrorKind::FundsFailure,
            Self::NotOwner { .. } |
            Self::Vault(VaultError::Unauthorized { .. }) |
            Self::RenounceDisabled => ErrorKind::AuthorizationFailure,
            Self::UnsupportedFlow |
            Self::MalformedInput |
            Self::InvalidRatio { .. } |
            Self::ZeroVerifier |
            Self::ZeroOwner |
            Self::ZeroVault |
            Self::LengthMismatch { .. } |
            Self::VaultMismatch { .. } => ErrorKind::ProtocolFailure,
        }
    }

    /// The 4-byte selector of this error's wire form.
    pub fn selector(&self) -> [u8; 4] {
        let encoded = encode_error_result(self);
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&encoded[..4]);
        selector
    }
}

/// Encodes a rejection as ABI revert data using the [`IPaymasterErrors`]
/// bindings, giving every failure a stable selector.
pub fn encode_error_result(error: &PaymasterError) -> Bytes {
    use IPaymasterErrors as E;
    match *error {
        PaymasterError::UnsupportedFlow => E::UnsupportedFlow {}.abi_encode().into(),
        PaymasterError::MalformedInput => E::MalformedInput {}.abi_encode().into(),
        PaymasterError::InvalidRatio { ratio } => E::InvalidRatio { ratio }.abi_encode().into(),
        PaymasterError::InvalidSignature => E::InvalidSignature {}.abi_encode().into(),
        PaymasterError::Expired { expiration, now } => {
            E::Expired { expiration, current: now }.abi_encode().into()
        }
        PaymasterError::NonceWindowExceeded { max_nonce, current_nonce } => {
            E::NonceWindowExceeded { maxNonce: max_nonce, currentNonce: current_nonce }
                .abi_encode()
                .into()
        }
        PaymasterError::GrantAlreadyUsed { digest } => {
            E::GrantAlreadyUsed { digest }.abi_encode().into()
        }
        PaymasterError::AllowanceTooLow { required, actual } => {
            E::AllowanceTooLow { required, actual }.abi_encode().into()
        }
        PaymasterError::TokenTransferFailed { token } => {
            E::TokenTransferFailed { token }.abi_encode().into()
        }
        PaymasterError::Vault(VaultError::Unauthorized { .. }) => {
            E::Unauthorized {}.abi_encode().into()
        }
        PaymasterError::Vault(VaultError::InsufficientBalance { requested, available }) => {
            E::InsufficientBalance { requested, available }.abi_encode().into()
        }
        PaymasterError::Vault(VaultError::Transfer(_)) | PaymasterError::Env(_) => {
            E::InsufficientBalance { requested: U256::ZERO, available: U256::ZERO }
                .abi_encode()
                .into()
        }
        PaymasterError::InsufficientPaymasterBalance { required, available } => {
            E::InsufficientPaymasterBalance { required, available }.abi_encode().into()
        }
        PaymasterError::NotOwner { caller } => E::NotOwner { caller }.abi_encode().into(),
        PaymasterError::ZeroVerifier | PaymasterError::ZeroOwner | PaymasterError::ZeroVault => {
            E::ZeroAddress {}.abi_encode().into()
        }
        PaymasterError::RenounceDisabled => E::RenounceDisabled {}.abi_encode().into(),
        PaymasterError::LengthMismatch { tokens, amounts } => E::LengthMismatch {
            tokens: U256::from(tokens),
            amounts: U256::from(amounts),
        }
        .abi_encode()
        .into(),
        PaymasterError::VaultMismatch { expected, actual } => {
            E::VaultMismatch { expected, actual }.abi_encode().into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(PaymasterError::InvalidSignature.kind(), ErrorKind::AuthFailure);
        assert_eq!(
            PaymasterError::Expired { expiration: 1, now: 2 }.kind(),
            ErrorKind::TemporalFailure
        );
        assert_eq!(
            PaymasterError::AllowanceTooLow { required: U256::from(2u64), actual: U256::ZERO }
                .kind(),
            ErrorKind::FundsFailure
        );
        assert_eq!(
            PaymasterError::NotOwner { caller: Address::ZERO }.kind(),
            ErrorKind::AuthorizationFailure
        );
        assert_eq!(PaymasterError::UnsupportedFlow.kind(), ErrorKind::ProtocolFailure);
        assert_eq!(
            PaymasterError::Vault(VaultError::Unauthorized { caller: Address::ZERO }).kind(),
            ErrorKind::AuthorizationFailure
        );
    }

    #[test]
    fn selectors_are_stable_and_distinct() {
        let errors = [
            PaymasterError::UnsupportedFlow,
            PaymasterError::MalformedInput,
            PaymasterError::InvalidSignature,
            PaymasterError::Expired { expiration: 0, now: 1 },
            PaymasterError::NonceWindowExceeded {
                max_nonce: U256::ZERO,
                current_nonce: 1,
            },
            PaymasterError::AllowanceTooLow { required: U256::from(1u64), actual: U256::ZERO },
            PaymasterError::Vault(VaultError::Unauthorized { caller: Address::ZERO }),
            PaymasterError::Vault(VaultError::InsufficientBalance {
                requested: U256::from(1u64),
                available: U256::ZERO,
            }),
            PaymasterError::NotOwner { caller: Address::ZERO },
            PaymasterError::RenounceDisabled,
        ];
        for (i, a) in errors.iter().enumerate() {
            for b in &errors[i + 1..] {
                assert_ne!(a.selector(), b.selector(), "{a} and {b} share a selector");
            }
        }
        // Argument values never change the selector.
        assert_eq!(
            PaymasterError::Expired { expiration: 0, now: 1 }.selector(),
            PaymasterError::Expired { expiration: 7, now: 9 }.selector()
        );
    }
}
