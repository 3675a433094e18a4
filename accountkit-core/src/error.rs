use thiserror::Error;

/// Result type for account operations.
pub type AccountResult<T, E = AccountError> = std::result::Result<T, E>;

/// Error outputs from `AccountKit`.
///
/// Every variant renders as a stable identifier so a submitter can tell the
/// cause of a rejected or reverted transaction apart from any other.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum AccountError {
    // Authorization
    /// The caller is not the account itself.
    #[error("only_self")]
    OnlySelf,
    /// The caller is not the protocol (zero address).
    #[error("non_null_caller")]
    NonNullCaller,
    /// The caller is not the configured recovery guardian.
    #[error("only_guardian")]
    OnlyGuardian,
    /// The number of signatures does not match the account policy.
    #[error("invalid_signature_length")]
    InvalidSignatureLength,
    /// The owner signature is missing, from the wrong signer, or invalid.
    #[error("invalid_owner_sig")]
    InvalidOwnerSignature,
    /// The guardian signature is missing, from the wrong signer, or invalid.
    #[error("invalid_guardian_sig")]
    InvalidGuardianSignature,
    /// A signature failed verification against its signer.
    #[error("invalid_signature")]
    InvalidSignature,
    /// A signer's key material is malformed for its kind.
    #[error("invalid_signer")]
    InvalidSigner,

    // State policy
    /// The owner can never be removed.
    #[error("null_owner")]
    NullOwner,
    /// A guardian backup cannot exist without a guardian.
    #[error("backup_should_be_null")]
    BackupShouldBeNull,
    /// The operation needs a guardian and none is configured.
    #[error("guardian_required")]
    GuardianRequired,
    /// The escape to complete has no new signer.
    #[error("null_new_owner")]
    NullNewOwner,
    /// Recovery is disabled on this account.
    #[error("escape_disabled")]
    EscapeDisabled,
    /// The escape is not in the state this operation requires.
    #[error("invalid_escape")]
    InvalidEscape,
    /// The escape has not reached its ready time yet.
    #[error("escape_not_ready")]
    EscapeNotReady,
    /// The pending escape is of the other type.
    #[error("invalid_escape_type")]
    InvalidEscapeType,
    /// A pending escape of the other role cannot be overridden before it expires.
    #[error("cannot_override_escape")]
    CannotOverrideEscape,
    /// The resubmitted recovery call does not match the triggered one.
    #[error("invalid_escape_call")]
    InvalidEscapeCall,
    /// Recovery parameters are half configured.
    #[error("invalid_escape_params")]
    InvalidEscapeParams,
    /// The recovery selector is not on the allow-list.
    #[error("invalid_escape_selector")]
    InvalidEscapeSelector,
    /// Recovery cannot be reconfigured while an escape is active.
    #[error("ongoing_escape")]
    OngoingEscape,
    /// The recovery guardian is not a valid address for its configuration.
    #[error("invalid_guardian_address")]
    InvalidGuardianAddress,
    /// A multisig threshold is zero or exceeds the signer count.
    #[error("bad_threshold")]
    BadThreshold,
    /// A multisig signer is listed twice.
    #[error("already_a_signer")]
    AlreadyASigner,
    /// A multisig signer is not in the list.
    #[error("not_a_signer")]
    NotASigner,
    /// Multisig signatures are not in strictly increasing signer order.
    #[error("signatures_not_sorted")]
    SignaturesNotSorted,

    // Throttling
    /// The escape attempt ceiling for this role was reached.
    #[error("max_escape_attempts")]
    MaxEscapeAttempts,
    /// The transaction's declared max fee is above the escape ceiling.
    #[error("max_fee_too_high")]
    MaxFeeTooHigh,

    // Structural
    /// Calldata or a signature payload could not be decoded.
    #[error("invalid_calldata: {0}")]
    InvalidCalldata(String),
    /// A multicall targets the account itself.
    #[error("no_multicall_to_self")]
    NoMulticallToSelf,
    /// The transaction version is not supported.
    #[error("invalid_tx_version")]
    InvalidTxVersion,
    /// The outside execution nonce was already consumed.
    #[error("duplicated_outside_nonce")]
    DuplicatedOutsideNonce,
    /// The outside execution window has not opened yet.
    #[error("outside_execution_too_early")]
    OutsideExecutionTooEarly,
    /// The outside execution window has already closed.
    #[error("outside_execution_expired")]
    OutsideExecutionExpired,
    /// The outside execution is scoped to a different caller.
    #[error("invalid_caller")]
    InvalidCaller,
    /// No entrypoint matches the selector.
    #[error("entrypoint_not_found")]
    EntrypointNotFound,
    /// A call to another contract failed.
    #[error("call_failed: {0}")]
    CallFailed(String),
    /// Unexpected error serializing account state.
    #[error("serialization_error: {0}")]
    SerializationError(String),
    /// Persisted state was written by an incompatible version.
    #[error("unsupported_state_version: {0}")]
    UnsupportedStateVersion(u32),
}

impl AccountError {
    /// Convenience constructor for decoding failures.
    pub(crate) fn calldata(reason: impl Into<String>) -> Self {
        Self::InvalidCalldata(reason.into())
    }
}
