//! ERC20 fee-sponsorship paymaster protocol.
//!
//! Lets an account pay transaction fees in an ERC20 token while a paymaster
//! fronts the native-currency fee. Each sponsorship is authorized off-chain by
//! a trusted verifier that signs a grant over the transaction's cost-relevant
//! fields; the paymaster recomputes the grant digest during validation, checks
//! the signature, expiration and nonce window, collects the token fee (or a
//! ratio-bounded share of it, with the remainder drawn from a protocol-funded
//! [`SponsorshipVault`]), and advances the native fee.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod codec;
pub use codec::*;

mod signature;
pub use signature::*;

mod guard;
pub use guard::*;

mod env;
pub use env::*;

mod ownership;
pub use ownership::*;

mod vault;
pub use vault::*;

mod paymaster;
pub use paymaster::*;

mod basic;
pub use basic::*;

mod signer;
pub use signer::*;

mod error;
pub use error::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
