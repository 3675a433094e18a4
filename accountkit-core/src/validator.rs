//! Signature-set policy checks.
//!
//! The policy is owner-only while no guardian is configured. Once a guardian
//! exists every full check needs exactly `[owner, guardian | guardian_backup]`,
//! in that order.

use crate::codec::decode_all;
use crate::error::{AccountError, AccountResult};
use crate::primitives::{Felt, Guid};
use crate::signer::SignerSignature;

/// Read access to the signer identities an account currently trusts.
pub trait SignerPolicy {
    /// GUID of the owner. Never zero.
    fn owner_guid(&self) -> Guid;

    /// GUID of the guardian, if one is configured.
    fn guardian_guid(&self) -> Option<Guid>;

    /// GUID of the guardian backup. Always `None` when there is no guardian.
    fn guardian_backup_guid(&self) -> Option<Guid>;
}

/// Decodes a transaction signature into its signer signatures.
///
/// # Errors
/// Returns [`AccountError::InvalidCalldata`] if the words are not a
/// length-prefixed list of signer signatures.
pub fn parse_signatures(words: &[Felt]) -> AccountResult<Vec<SignerSignature>> {
    decode_all(words)
}

/// Whether `signatures` satisfies the full policy for `hash`.
#[must_use]
pub fn is_valid_signature_set<P: SignerPolicy + ?Sized>(
    policy: &P,
    hash: Felt,
    signatures: &[SignerSignature],
) -> bool {
    assert_valid_signature_set(policy, hash, signatures).is_ok()
}

/// Checks `signatures` against the full owner (and guardian) policy.
///
/// # Errors
/// - [`AccountError::InvalidSignatureLength`] if the count does not match the policy.
/// - [`AccountError::InvalidOwnerSignature`] if the first entry is not a valid owner signature.
/// - [`AccountError::InvalidGuardianSignature`] if the second entry is not a valid
///   guardian or guardian backup signature.
pub fn assert_valid_signature_set<P: SignerPolicy + ?Sized>(
    policy: &P,
    hash: Felt,
    signatures: &[SignerSignature],
) -> AccountResult<()> {
    if policy.guardian_guid().is_none() {
        let [owner] = signatures else {
            return Err(AccountError::InvalidSignatureLength);
        };
        return assert_owner_signature(policy, hash, owner);
    }
    let [owner, guardian] = signatures else {
        return Err(AccountError::InvalidSignatureLength);
    };
    assert_owner_signature(policy, hash, owner)?;
    assert_guardian_signature(policy, hash, guardian)
}

/// Checks that `signatures` is exactly one valid owner signature.
///
/// # Errors
/// [`AccountError::InvalidSignatureLength`] or [`AccountError::InvalidOwnerSignature`].
pub fn assert_valid_owner_only<P: SignerPolicy + ?Sized>(
    policy: &P,
    hash: Felt,
    signatures: &[SignerSignature],
) -> AccountResult<()> {
    let [owner] = signatures else {
        return Err(AccountError::InvalidSignatureLength);
    };
    assert_owner_signature(policy, hash, owner)
}

/// Checks that `signatures` is exactly one valid guardian (or backup) signature.
///
/// # Errors
/// [`AccountError::GuardianRequired`], [`AccountError::InvalidSignatureLength`]
/// or [`AccountError::InvalidGuardianSignature`].
pub fn assert_valid_guardian_only<P: SignerPolicy + ?Sized>(
    policy: &P,
    hash: Felt,
    signatures: &[SignerSignature],
) -> AccountResult<()> {
    if policy.guardian_guid().is_none() {
        return Err(AccountError::GuardianRequired);
    }
    let [guardian] = signatures else {
        return Err(AccountError::InvalidSignatureLength);
    };
    assert_guardian_signature(policy, hash, guardian)
}

fn assert_owner_signature<P: SignerPolicy + ?Sized>(
    policy: &P,
    hash: Felt,
    signature: &SignerSignature,
) -> AccountResult<()> {
    if signature.signer_guid() == policy.owner_guid() && signature.is_valid_signature(hash) {
        Ok(())
    } else {
        Err(AccountError::InvalidOwnerSignature)
    }
}

fn assert_guardian_signature<P: SignerPolicy + ?Sized>(
    policy: &P,
    hash: Felt,
    signature: &SignerSignature,
) -> AccountResult<()> {
    let guid = Some(signature.signer_guid());
    let is_guardian = guid == policy.guardian_guid() || guid == policy.guardian_backup_guid();
    if is_guardian && signature.is_valid_signature(hash) {
        Ok(())
    } else {
        Err(AccountError::InvalidGuardianSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Signer;
    use alloy_primitives::U256;
    use ed25519_dalek::Signer as _;

    struct Policy {
        owner: Guid,
        guardian: Option<Guid>,
        backup: Option<Guid>,
    }

    impl SignerPolicy for Policy {
        fn owner_guid(&self) -> Guid {
            self.owner
        }
        fn guardian_guid(&self) -> Option<Guid> {
            self.guardian
        }
        fn guardian_backup_guid(&self) -> Option<Guid> {
            self.backup
        }
    }

    fn sign(seed: u8, hash: Felt) -> SignerSignature {
        let key = ed25519_dalek::SigningKey::from_bytes(&[seed; 32]);
        let raw = key.sign(&hash.to_be_bytes::<32>()).to_bytes();
        SignerSignature::Ed25519 {
            signer: Signer::Ed25519 {
                pubkey: U256::from_be_bytes(key.verifying_key().to_bytes()),
            },
            r: U256::from_be_slice(&raw[..32]),
            s: U256::from_be_slice(&raw[32..]),
        }
    }

    fn guid(seed: u8) -> Guid {
        sign(seed, U256::ZERO).signer_guid()
    }

    #[test]
    fn test_owner_only_rejects_two_signatures() {
        let hash = U256::from(99);
        let policy = Policy {
            owner: guid(1),
            guardian: None,
            backup: None,
        };
        assert!(is_valid_signature_set(&policy, hash, &[sign(1, hash)]));
        assert_eq!(
            assert_valid_signature_set(&policy, hash, &[sign(1, hash), sign(1, hash)]),
            Err(AccountError::InvalidSignatureLength)
        );
    }

    #[test]
    fn test_guardian_policy_order_matters() {
        let hash = U256::from(7);
        let policy = Policy {
            owner: guid(1),
            guardian: Some(guid(2)),
            backup: Some(guid(3)),
        };
        assert!(is_valid_signature_set(&policy, hash, &[sign(1, hash), sign(2, hash)]));
        assert!(is_valid_signature_set(&policy, hash, &[sign(1, hash), sign(3, hash)]));
        assert_eq!(
            assert_valid_signature_set(&policy, hash, &[sign(2, hash), sign(1, hash)]),
            Err(AccountError::InvalidOwnerSignature)
        );
        assert_eq!(
            assert_valid_signature_set(&policy, hash, &[sign(1, hash)]),
            Err(AccountError::InvalidSignatureLength)
        );
        assert_eq!(
            assert_valid_signature_set(&policy, hash, &[sign(1, hash), sign(4, hash)]),
            Err(AccountError::InvalidGuardianSignature)
        );
    }

    #[test]
    fn test_rejects_signature_over_other_hash() {
        let policy = Policy {
            owner: guid(1),
            guardian: None,
            backup: None,
        };
        assert_eq!(
            assert_valid_owner_only(&policy, U256::from(1), &[sign(1, U256::from(2))]),
            Err(AccountError::InvalidOwnerSignature)
        );
    }

    #[test]
    fn test_guardian_only() {
        let hash = U256::from(5);
        let mut policy = Policy {
            owner: guid(1),
            guardian: None,
            backup: None,
        };
        assert_eq!(
            assert_valid_guardian_only(&policy, hash, &[sign(2, hash)]),
            Err(AccountError::GuardianRequired)
        );
        policy.guardian = Some(guid(2));
        assert!(assert_valid_guardian_only(&policy, hash, &[sign(2, hash)]).is_ok());
        assert_eq!(
            assert_valid_guardian_only(&policy, hash, &[sign(1, hash)]),
            Err(AccountError::InvalidGuardianSignature)
        );
    }
}
