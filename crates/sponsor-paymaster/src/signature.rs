//! Recovery and verification of verifier signatures over grant digests.

use alloy_primitives::{keccak256, Address, B256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use crate::{constants::SIGNATURE_LENGTH, error::PaymasterError};

/// Recovers the signer address from a 65-byte `r ‖ s ‖ v` signature over
/// `signing_hash`.
///
/// The recovery id byte accepts both the raw form (0/1) and the Ethereum
/// convention (27/28). A signature that is structurally invalid, fails point
/// recovery, or recovers to the zero identity yields
/// [`PaymasterError::InvalidSignature`].
pub fn recover_grant_signer(
    signing_hash: B256,
    signature: &[u8],
) -> Result<Address, PaymasterError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(PaymasterError::InvalidSignature);
    }

    let v = signature[SIGNATURE_LENGTH - 1];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id =
        RecoveryId::try_from(recovery_byte).map_err(|_| PaymasterError::InvalidSignature)?;

    let signature = Signature::from_slice(&signature[..SIGNATURE_LENGTH - 1])
        .map_err(|_| PaymasterError::InvalidSignature)?;

    let recovered_key =
        VerifyingKey::recover_from_prehash(signing_hash.as_slice(), &signature, recovery_id)
            .map_err(|_| PaymasterError::InvalidSignature)?;

    // Uncompressed point is 0x04 || x || y; the address is the last 20 bytes
    // of keccak256(x || y).
    let pubkey_point = recovered_key.to_encoded_point(false);
    let pubkey_hash = keccak256(&pubkey_point.as_bytes()[1..]);
    let address = Address::from_slice(&pubkey_hash[12..]);

    // A zero identity can never be a configured verifier; reject it here so a
    // malformed signature cannot alias a "never set" key.
    if address.is_zero() {
        return Err(PaymasterError::InvalidSignature);
    }
    Ok(address)
}

/// Verifies that `signature` over `signing_hash` recovers to `expected`.
///
/// Pure function of its inputs. A wrong signer is a normal negative result
/// surfaced as [`PaymasterError::InvalidSignature`]; callers cannot
/// distinguish it from a cryptographically malformed signature except via the
/// error value, by design of the protocol's error surface.
pub fn verify_grant_signature(
    signing_hash: B256,
    signature: &[u8],
    expected: Address,
) -> Result<(), PaymasterError> {
    let recovered = recover_grant_signer(signing_hash, signature)?;
    if recovered != expected {
        return Err(PaymasterError::InvalidSignature);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::b256;

    use super::*;
    use crate::test_utils::{signer_address, signer_key, sign_hash};

    const HASH: B256 = b256!("11d2d1d74fd6aab1cca875ebd73d67cb63c7fa9eb8b0bdd0a380f95ecc307115");

    #[test]
    fn recovers_the_signing_key() {
        let key = signer_key(7);
        let signature = sign_hash(&key, HASH);
        let recovered = recover_grant_signer(HASH, &signature).unwrap();
        assert_eq!(recovered, signer_address(&key));
    }

    #[test]
    fn accepts_raw_recovery_byte() {
        let key = signer_key(7);
        let mut signature = sign_hash(&key, HASH);
        // Same signature with v in 0/1 form instead of 27/28.
        signature[64] -= 27;
        let recovered = recover_grant_signer(HASH, &signature).unwrap();
        assert_eq!(recovered, signer_address(&key));
    }

    #[test]
    fn wrong_signer_is_a_negative_result() {
        let key = signer_key(7);
        let other = signer_key(8);
        let signature = sign_hash(&key, HASH);
        let err = verify_grant_signature(HASH, &signature, signer_address(&other)).unwrap_err();
        assert_eq!(err, PaymasterError::InvalidSignature);
    }

    #[test]
    fn tampered_hash_recovers_to_a_different_identity() {
        let key = signer_key(7);
        let signature = sign_hash(&key, HASH);
        let tampered =
            b256!("11d2d1d74fd6aab1cca875ebd73d67cb63c7fa9eb8b0bdd0a380f95ecc307116");
        let err = verify_grant_signature(tampered, &signature, signer_address(&key)).unwrap_err();
        assert_eq!(err, PaymasterError::InvalidSignature);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert_eq!(
            recover_grant_signer(HASH, &[0u8; 64]).unwrap_err(),
            PaymasterError::InvalidSignature
        );
        assert_eq!(
            recover_grant_signer(HASH, &[0u8; 66]).unwrap_err(),
            PaymasterError::InvalidSignature
        );
    }

    #[test]
    fn garbage_signature_is_rejected() {
        // All-zero r/s is not a valid scalar pair.
        let mut signature = [0u8; SIGNATURE_LENGTH];
        signature[64] = 27;
        assert_eq!(
            recover_grant_signer(HASH, &signature).unwrap_err(),
            PaymasterError::InvalidSignature
        );
    }

    #[test]
    fn invalid_recovery_byte_is_rejected() {
        let key = signer_key(7);
        let mut signature = sign_hash(&key, HASH);
        signature[64] = 29;
        // 29 maps to the reduced-x recovery branch, which cannot hold for
        // this signature.
        assert_eq!(
            recover_grant_signer(HASH, &signature).unwrap_err(),
            PaymasterError::InvalidSignature
        );
    }
}
