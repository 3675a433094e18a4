//! Owner/guardian escape state machine.
//!
//! `None -> NotReady -> Ready -> {completed, Expired} -> None`, with cancellation
//! reachable from any non-`None` status. At most one escape is live. An
//! owner-signed guardian escape may replace a pending owner escape, the
//! reverse only once the guardian escape has expired.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::config::AccountConfig;
use crate::error::{AccountError, AccountResult};
use crate::primitives::Guid;

/// Which role an escape replaces.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EscapeType {
    /// No escape.
    #[default]
    None,
    /// Guardian replaces the owner.
    Owner,
    /// Owner replaces (or removes) the guardian.
    Guardian,
}

/// Derived lifecycle status of an escape. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EscapeStatus {
    /// Nothing pending.
    None,
    /// Waiting for the security period to elapse.
    NotReady,
    /// Can be completed.
    Ready,
    /// Lapsed without completion.
    Expired,
}

/// Status of an escape that becomes ready at `ready_at` and lapses `expiry_period` later.
#[must_use]
pub const fn escape_status(ready_at: u64, now: u64, expiry_period: u64) -> EscapeStatus {
    if ready_at == 0 {
        EscapeStatus::None
    } else if now < ready_at {
        EscapeStatus::NotReady
    } else if now < ready_at.saturating_add(expiry_period) {
        EscapeStatus::Ready
    } else {
        EscapeStatus::Expired
    }
}

/// A pending escape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escape {
    /// Timestamp from which the escape can be completed. Zero when none.
    pub ready_at: u64,
    /// Role being replaced.
    pub escape_type: EscapeType,
    /// GUID of the replacement signer. `None` removes the guardian.
    pub new_signer: Option<Guid>,
}

impl Escape {
    /// Status at `now`.
    #[must_use]
    pub const fn status(&self, now: u64, expiry_period: u64) -> EscapeStatus {
        escape_status(self.ready_at, now, expiry_period)
    }
}

/// Role whose signature authorizes an escape call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EscapeRole {
    /// Owner-signed: `trigger_escape_guardian`, `escape_guardian`.
    Owner,
    /// Guardian-signed: `trigger_escape_owner`, `escape_owner`.
    Guardian,
}

/// Throttled escape calls per signing role since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct EscapeAttempts {
    /// Owner-signed attempts.
    pub owner: u32,
    /// Guardian-signed attempts.
    pub guardian: u32,
}

/// Outcome of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Triggered {
    pub ready_at: u64,
    /// A `NotReady` or `Ready` escape was dropped to make room.
    pub replaced_live_escape: bool,
}

/// Escape plus attempt counters, as persisted in the account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscapeState {
    escape: Escape,
    attempts: EscapeAttempts,
}

impl EscapeState {
    /// The pending escape, cleared to default when none.
    #[must_use]
    pub const fn escape(&self) -> Escape {
        self.escape
    }

    /// Attempt counters.
    #[must_use]
    pub const fn attempts(&self) -> EscapeAttempts {
        self.attempts
    }

    /// Status of the pending escape at `now`.
    #[must_use]
    pub const fn status(&self, now: u64, expiry_period: u64) -> EscapeStatus {
        self.escape.status(now, expiry_period)
    }

    /// Drops the pending escape. Returns whether it was still live.
    pub(crate) fn clear(&mut self, now: u64, expiry_period: u64) -> bool {
        let status = self.status(now, expiry_period);
        self.escape = Escape::default();
        matches!(status, EscapeStatus::NotReady | EscapeStatus::Ready)
    }

    pub(crate) fn reset_attempts(&mut self) {
        self.attempts = EscapeAttempts::default();
    }

    /// Counts one throttled escape call signed by `role`.
    ///
    /// # Errors
    /// [`AccountError::MaxEscapeAttempts`] once the role reached the ceiling,
    /// [`AccountError::MaxFeeTooHigh`] if `max_fee` exceeds the escape fee ceiling.
    pub(crate) fn consume_attempt(
        &mut self,
        role: EscapeRole,
        max_fee: u128,
        config: &AccountConfig,
    ) -> AccountResult<()> {
        let attempts = match role {
            EscapeRole::Owner => &mut self.attempts.owner,
            EscapeRole::Guardian => &mut self.attempts.guardian,
        };
        if *attempts >= config.max_escape_attempts {
            return Err(AccountError::MaxEscapeAttempts);
        }
        if max_fee > config.max_escape_max_fee {
            return Err(AccountError::MaxFeeTooHigh);
        }
        *attempts += 1;
        Ok(())
    }

    /// Starts an escape of `escape_type` towards `new_signer`.
    ///
    /// # Errors
    /// [`AccountError::CannotOverrideEscape`] when an owner escape would replace a
    /// live guardian escape.
    pub(crate) fn trigger(
        &mut self,
        escape_type: EscapeType,
        new_signer: Option<Guid>,
        now: u64,
        config: &AccountConfig,
    ) -> AccountResult<Triggered> {
        let current = self.status(now, config.escape_expiry_period);
        if escape_type == EscapeType::Owner
            && self.escape.escape_type == EscapeType::Guardian
            && matches!(current, EscapeStatus::NotReady | EscapeStatus::Ready)
        {
            return Err(AccountError::CannotOverrideEscape);
        }
        let replaced_live_escape = self.clear(now, config.escape_expiry_period);
        let ready_at = now.saturating_add(config.escape_security_period);
        self.escape = Escape {
            ready_at,
            escape_type,
            new_signer,
        };
        Ok(Triggered {
            ready_at,
            replaced_live_escape,
        })
    }

    /// Completes a ready escape of `escape_type`, returning its new signer.
    ///
    /// Clears the escape and resets both attempt counters.
    ///
    /// # Errors
    /// [`AccountError::EscapeNotReady`] before the security period elapsed,
    /// [`AccountError::InvalidEscape`] when nothing is pending or it expired,
    /// [`AccountError::InvalidEscapeType`] when the pending escape is of the other type.
    pub(crate) fn complete(
        &mut self,
        escape_type: EscapeType,
        now: u64,
        expiry_period: u64,
    ) -> AccountResult<Option<Guid>> {
        match self.status(now, expiry_period) {
            EscapeStatus::Ready => {}
            EscapeStatus::NotReady => return Err(AccountError::EscapeNotReady),
            EscapeStatus::None | EscapeStatus::Expired => return Err(AccountError::InvalidEscape),
        }
        if self.escape.escape_type != escape_type {
            return Err(AccountError::InvalidEscapeType);
        }
        let new_signer = self.escape.new_signer;
        self.escape = Escape::default();
        self.reset_attempts();
        Ok(new_signer)
    }

    /// Cancels any pending escape and returns the status it had.
    ///
    /// # Errors
    /// [`AccountError::InvalidEscape`] when nothing is pending.
    pub(crate) fn cancel(&mut self, now: u64, expiry_period: u64) -> AccountResult<EscapeStatus> {
        let status = self.status(now, expiry_period);
        if status == EscapeStatus::None {
            return Err(AccountError::InvalidEscape);
        }
        self.escape = Escape::default();
        self.reset_attempts();
        Ok(status)
    }
}
