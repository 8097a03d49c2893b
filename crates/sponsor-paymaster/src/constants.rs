//! Constants for the sponsorship-grant protocol.

use alloy_primitives::{address, Address};

/// Denominator of the token/native exchange ratio used when computing the
/// minimal token allowance for a grant:
/// `minimalAllowance = gasLimit × gasPrice × exchangeRatio / RATIO_SCALE`.
pub const RATIO_SCALE: u64 = 100_000_000;

/// Sponsorship ratios are expressed in basis points; 10000 means the named
/// protocol covers the full fee.
pub const MAX_SPONSORSHIP_RATIO: u16 = 10_000;

/// Length of a grant signature: `r ‖ s ‖ v` with a one-byte recovery id.
pub const SIGNATURE_LENGTH: usize = 65;

/// The formal fee account of the execution environment. The paymaster advances
/// the native fee of a validated transaction to this address up front; unused
/// gas is refunded from it during settlement.
pub const FEE_COLLECTOR_ADDRESS: Address = address!("0x0000000000000000000000000000000000008001");
