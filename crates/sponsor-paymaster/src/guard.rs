//! Temporal and replay bounds on grant validity.
//!
//! A grant is bounded two ways: an absolute expiration timestamp, and an
//! upper bound on the payer's on-chain nonce. The nonce bound is a *validity
//! window*, not a single-use token: the same grant validates for every
//! transaction the payer sends until the nonce passes `max_nonce` or the
//! expiration passes, whichever comes first. Callers that need exact replay
//! prevention opt into [`ReplayProtection::SingleUse`], which additionally
//! tracks spent grant digests.

use alloy_primitives::{map::HashSet, B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::PaymasterError;

/// Checks the grant's absolute expiration. There is no grace window.
pub fn check_expiration(now: u64, expiration: u64) -> Result<(), PaymasterError> {
    if now > expiration {
        return Err(PaymasterError::Expired { expiration, now });
    }
    Ok(())
}

/// Checks the nonce validity window: the payer's current on-chain nonce must
/// not have passed the grant's `max_nonce`.
pub fn check_nonce_window(current_nonce: u64, max_nonce: U256) -> Result<(), PaymasterError> {
    if U256::from(current_nonce) > max_nonce {
        return Err(PaymasterError::NonceWindowExceeded { max_nonce, current_nonce });
    }
    Ok(())
}

/// How the paymaster bounds grant replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReplayProtection {
    /// The original semantics: a grant stays valid for every transaction
    /// inside its nonce/expiration window.
    #[default]
    ValidityWindow,
    /// Strict mode: each grant digest validates at most once.
    SingleUse,
}

/// The set of grant digests already consumed under
/// [`ReplayProtection::SingleUse`].
#[derive(Debug, Clone, Default)]
pub struct SpentGrants {
    spent: HashSet<B256>,
}

impl SpentGrants {
    /// Whether `digest` has already been consumed.
    pub fn is_spent(&self, digest: B256) -> bool {
        self.spent.contains(&digest)
    }

    /// Marks `digest` as consumed. Returns `false` if it was already spent.
    pub fn mark_spent(&mut self, digest: B256) -> bool {
        self.spent.insert(digest)
    }

    /// Number of consumed digests.
    pub fn len(&self) -> usize {
        self.spent.len()
    }

    /// Whether no digest has been consumed yet.
    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::b256;

    use super::*;

    #[test]
    fn expiration_boundary_is_inclusive() {
        assert!(check_expiration(100, 100).is_ok());
        assert!(check_expiration(99, 100).is_ok());
        assert_eq!(
            check_expiration(101, 100).unwrap_err(),
            PaymasterError::Expired { expiration: 100, now: 101 }
        );
    }

    #[test]
    fn nonce_window_boundary_is_inclusive() {
        assert!(check_nonce_window(50, U256::from(50u64)).is_ok());
        assert!(check_nonce_window(0, U256::from(50u64)).is_ok());
        assert_eq!(
            check_nonce_window(51, U256::from(50u64)).unwrap_err(),
            PaymasterError::NonceWindowExceeded {
                max_nonce: U256::from(50u64),
                current_nonce: 51
            }
        );
    }

    #[test]
    fn spent_grants_track_digests() {
        let digest =
            b256!("00000000000000000000000000000000000000000000000000000000000000aa");
        let mut spent = SpentGrants::default();
        assert!(spent.is_empty());
        assert!(!spent.is_spent(digest));
        assert!(spent.mark_spent(digest));
        assert!(spent.is_spent(digest));
        assert!(!spent.mark_spent(digest));
        assert_eq!(spent.len(), 1);
    }
}
