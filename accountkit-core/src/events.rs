use serde::{Deserialize, Serialize};

use crate::primitives::{Felt, Guid};
use crate::signer::Signer;

/// Domain events emitted by accounts. Only events of committed entry points are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AccountEvent {
    /// The account was created.
    AccountCreated {
        /// Initial owner.
        owner_guid: Guid,
        /// Initial guardian, if any.
        guardian_guid: Option<Guid>,
    },
    /// Key material was linked to a GUID.
    SignerLinked {
        /// GUID of the signer.
        signer_guid: Guid,
        /// Key material.
        signer: Signer,
    },
    /// A transaction or outside execution ran its calls.
    TransactionExecuted {
        /// Transaction or outside execution message hash.
        hash: Felt,
        /// Return data of each call.
        response: Vec<Vec<Felt>>,
    },
    /// The owner was replaced by a self-call.
    OwnerChanged {
        /// New owner.
        new_owner_guid: Guid,
    },
    /// The guardian was replaced or removed by a self-call.
    GuardianChanged {
        /// New guardian.
        new_guardian_guid: Option<Guid>,
    },
    /// The guardian backup was replaced or removed by a self-call.
    GuardianBackupChanged {
        /// New guardian backup.
        new_guardian_backup_guid: Option<Guid>,
    },
    /// The guardian started replacing the owner.
    EscapeOwnerTriggered {
        /// When the escape can be completed.
        ready_at: u64,
        /// Replacement owner.
        new_owner_guid: Guid,
    },
    /// The owner started replacing the guardian.
    EscapeGuardianTriggered {
        /// When the escape can be completed.
        ready_at: u64,
        /// Replacement guardian, `None` to remove it.
        new_guardian_guid: Option<Guid>,
    },
    /// An owner escape completed.
    OwnerEscaped {
        /// New owner.
        new_owner_guid: Guid,
    },
    /// A guardian escape completed.
    GuardianEscaped {
        /// New guardian.
        new_guardian_guid: Option<Guid>,
    },
    /// A live escape was canceled or replaced.
    EscapeCanceled,
    /// External recovery event.
    Recovery(RecoveryEvent),
    /// A multisig signer was added.
    SignerAdded {
        /// Added signer.
        signer_guid: Guid,
    },
    /// A multisig signer was removed.
    SignerRemoved {
        /// Removed signer.
        signer_guid: Guid,
    },
    /// The multisig threshold changed.
    ThresholdUpdated {
        /// New threshold.
        new_threshold: u32,
    },
}

/// Events of the external recovery component, keyed by the recovery call hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "recovery_event", rename_all = "snake_case")]
pub enum RecoveryEvent {
    /// The guardian triggered a recovery.
    EscapeTriggered {
        /// When the recovery can be executed.
        ready_at: u64,
        /// Hash binding the recovery call.
        call_hash: Felt,
    },
    /// A recovery was executed.
    EscapeExecuted {
        /// Hash of the executed call.
        call_hash: Felt,
    },
    /// A live recovery was canceled or replaced.
    EscapeCanceled {
        /// Hash of the canceled call.
        call_hash: Felt,
    },
}

impl From<RecoveryEvent> for AccountEvent {
    fn from(event: RecoveryEvent) -> Self {
        Self::Recovery(event)
    }
}
