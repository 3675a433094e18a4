//! GUID-keyed store of signer key material.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AccountResult;
use crate::primitives::Guid;
use crate::signer::Signer;

/// Key material for every signer an account has linked, indexed by GUID.
///
/// Authorization state only stores GUIDs. The registry keeps the full
/// [`Signer`] so queries can hand back key material, and so a GUID can always
/// be recomputed from what was registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerRegistry {
    signers: HashMap<Guid, Signer>,
}

impl SignerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `signer` and links it, returning its GUID.
    ///
    /// Registering the same key twice is a no-op.
    ///
    /// # Errors
    /// Returns [`crate::AccountError::InvalidSigner`] for malformed key material.
    pub fn register(&mut self, signer: &Signer) -> AccountResult<Guid> {
        signer.validate()?;
        let guid = signer.guid();
        self.signers.entry(guid).or_insert_with(|| signer.clone());
        Ok(guid)
    }

    /// Looks up the key material behind `guid`.
    #[must_use]
    pub fn resolve(&self, guid: &Guid) -> Option<&Signer> {
        self.signers.get(guid)
    }

    /// Whether `guid` was ever registered.
    #[must_use]
    pub fn contains(&self, guid: &Guid) -> bool {
        self.signers.contains_key(guid)
    }

    /// Number of linked signers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.signers.len()
    }

    /// Whether no signer was linked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }
}
