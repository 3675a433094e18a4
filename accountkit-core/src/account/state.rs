use serde::{Deserialize, Serialize};

use crate::error::{AccountError, AccountResult};
use crate::escape::EscapeState;
use crate::outside_execution::NonceSet;
use crate::persistence;
use crate::primitives::Guid;
use crate::registry::SignerRegistry;
use crate::signer::Signer;
use crate::validator::SignerPolicy;

/// Everything a [`super::SmartAccount`] persists.
///
/// Invariants: `owner` is a registered GUID, `guardian_backup` is `None`
/// whenever `guardian` is, and `escape_candidate` is the signer behind the
/// pending escape's GUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub(super) owner: Guid,
    pub(super) guardian: Option<Guid>,
    pub(super) guardian_backup: Option<Guid>,
    pub(super) signers: SignerRegistry,
    pub(super) escape: EscapeState,
    /// Key material of the pending escape's replacement, linked on completion.
    pub(super) escape_candidate: Option<Signer>,
    pub(super) outside_nonces: NonceSet,
}

impl AccountState {
    pub(super) fn new(owner: &Signer, guardian: Option<&Signer>) -> AccountResult<Self> {
        let mut signers = SignerRegistry::new();
        let owner = signers.register(owner)?;
        let guardian = guardian.map(|signer| signers.register(signer)).transpose()?;
        Ok(Self {
            owner,
            guardian,
            guardian_backup: None,
            signers,
            escape: EscapeState::default(),
            escape_candidate: None,
            outside_nonces: NonceSet::default(),
        })
    }

    /// Linked signers.
    #[must_use]
    pub const fn signers(&self) -> &SignerRegistry {
        &self.signers
    }

    /// Escape and attempt counters.
    #[must_use]
    pub const fn escape(&self) -> &EscapeState {
        &self.escape
    }

    /// Replacement signer of the pending escape, not linked yet.
    #[must_use]
    pub const fn escape_candidate(&self) -> Option<&Signer> {
        self.escape_candidate.as_ref()
    }

    /// Consumed outside execution nonces.
    #[must_use]
    pub const fn outside_nonces(&self) -> &NonceSet {
        &self.outside_nonces
    }

    /// Serializes the state as a versioned CBOR envelope.
    ///
    /// # Errors
    /// [`AccountError::SerializationError`] if encoding fails.
    pub fn to_bytes(&self) -> AccountResult<Vec<u8>> {
        persistence::serialize(self)
    }

    /// Restores state written by [`Self::to_bytes`].
    ///
    /// # Errors
    /// - [`AccountError::SerializationError`] for undecodable bytes.
    /// - [`AccountError::UnsupportedStateVersion`] for another envelope version.
    /// - [`AccountError::NullOwner`], [`AccountError::BackupShouldBeNull`] or
    ///   [`AccountError::InvalidEscape`] if the decoded state breaks an invariant.
    pub fn from_bytes(bytes: &[u8]) -> AccountResult<Self> {
        let state: Self = persistence::deserialize(bytes)?;
        state.check_invariants()?;
        Ok(state)
    }

    pub(super) fn check_invariants(&self) -> AccountResult<()> {
        if self.owner.is_zero() || !self.signers.contains(&self.owner) {
            return Err(AccountError::NullOwner);
        }
        if self.guardian.is_none() && self.guardian_backup.is_some() {
            return Err(AccountError::BackupShouldBeNull);
        }
        if let Some(candidate) = &self.escape_candidate {
            if Some(candidate.guid()) != self.escape.escape().new_signer {
                return Err(AccountError::InvalidEscape);
            }
        }
        Ok(())
    }
}

impl SignerPolicy for AccountState {
    fn owner_guid(&self) -> Guid {
        self.owner
    }

    fn guardian_guid(&self) -> Option<Guid> {
        self.guardian
    }

    fn guardian_backup_guid(&self) -> Option<Guid> {
        self.guardian_backup
    }
}
