//! External recovery: a guardian address can, after a security period,
//! apply one allow-listed signer-list mutation to the embedding account.
//!
//! The component owns only its escape and configuration. Applying the action
//! is delegated to the embedding account through [`RecoveryHost`].

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::codec::{Decode, Encode, WordReader};
use crate::config::RecoveryConfig;
use crate::error::{AccountError, AccountResult};
use crate::escape::{escape_status, EscapeStatus};
use crate::events::RecoveryEvent;
use crate::guards::CallContext;
use crate::primitives::{hash_on_elements, selector, short_string, Felt};

/// Entry points a recovery may call on the embedding account.
pub const RECOVERY_SELECTOR_NAMES: [&str; 4] = [
    "replace_signer",
    "add_signers",
    "remove_signers",
    "change_threshold",
];

/// Domain separator for recovery call hashes.
fn escape_call_magic() -> Felt {
    short_string("ExternalRecovery.EscapeCall")
}

/// Whether `selector` may be the target of a recovery.
#[must_use]
pub fn is_recovery_selector(value: Felt) -> bool {
    RECOVERY_SELECTOR_NAMES
        .iter()
        .any(|name| selector(name) == value)
}

/// The action a recovery applies once ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscapeCall {
    /// Entry point on the embedding account.
    pub selector: Felt,
    /// Encoded arguments.
    pub calldata: Vec<Felt>,
}

impl EscapeCall {
    /// Creates an escape call.
    #[must_use]
    pub const fn new(selector: Felt, calldata: Vec<Felt>) -> Self {
        Self { selector, calldata }
    }

    /// Hash binding execution to exactly the triggered action.
    #[must_use]
    pub fn hash(&self) -> Felt {
        hash_on_elements(&[
            escape_call_magic(),
            self.selector,
            hash_on_elements(&self.calldata),
        ])
    }
}

impl Encode for EscapeCall {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.selector.encode(out);
        self.calldata.encode(out);
    }
}

impl Decode for EscapeCall {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        Ok(Self {
            selector: Felt::decode(reader)?,
            calldata: Vec::decode(reader)?,
        })
    }
}

impl Encode for RecoveryConfig {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.is_enabled.encode(out);
        self.security_period.encode(out);
        self.expiry_period.encode(out);
    }
}

impl Decode for RecoveryConfig {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        Ok(Self {
            is_enabled: bool::decode(reader)?,
            security_period: u64::decode(reader)?,
            expiry_period: u64::decode(reader)?,
        })
    }
}

/// A pending recovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryEscape {
    /// Timestamp from which the recovery can be executed. Zero when none.
    pub ready_at: u64,
    /// Hash of the [`EscapeCall`] to execute.
    pub call_hash: Felt,
}

/// Implemented by accounts embedding [`ExternalRecovery`].
pub trait RecoveryHost {
    /// Applies a ready recovery action to the host's own authorization state.
    ///
    /// # Errors
    /// Any error aborts the recovery. The caller is expected to roll back.
    fn apply_recovered_action(&mut self, call: &EscapeCall) -> AccountResult<()>;
}

/// Recovery state and configuration of one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRecovery {
    config: RecoveryConfig,
    guardian: Address,
    escape: RecoveryEscape,
}

impl ExternalRecovery {
    /// The pending recovery and its status at `now`.
    #[must_use]
    pub const fn get_escape(&self, now: u64) -> (RecoveryEscape, EscapeStatus) {
        (self.escape, self.status(now))
    }

    /// Current configuration.
    #[must_use]
    pub const fn get_escape_config(&self) -> RecoveryConfig {
        self.config
    }

    /// Address allowed to trigger recoveries. Zero while disabled.
    #[must_use]
    pub const fn guardian(&self) -> Address {
        self.guardian
    }

    const fn status(&self, now: u64) -> EscapeStatus {
        escape_status(self.escape.ready_at, now, self.config.expiry_period)
    }

    /// Enables or disables recovery. Self-call only.
    ///
    /// Enabling needs non-zero periods and a guardian other than the account.
    /// Disabling needs all of them zeroed. An expired recovery is dropped.
    ///
    /// # Errors
    /// - [`AccountError::OnlySelf`] if the caller is not the account.
    /// - [`AccountError::OngoingEscape`] while a recovery is `NotReady` or `Ready`.
    /// - [`AccountError::InvalidEscapeParams`] for a half-configured request.
    /// - [`AccountError::InvalidGuardianAddress`] for a zero or self guardian.
    pub fn toggle_escape(
        &mut self,
        ctx: &CallContext,
        config: RecoveryConfig,
        guardian: Address,
    ) -> AccountResult<()> {
        ctx.assert_only_self()?;
        match self.status(ctx.now) {
            EscapeStatus::None => {}
            EscapeStatus::NotReady | EscapeStatus::Ready => {
                return Err(AccountError::OngoingEscape);
            }
            EscapeStatus::Expired => self.escape = RecoveryEscape::default(),
        }

        if config.is_enabled {
            if config.security_period == 0 || config.expiry_period == 0 {
                return Err(AccountError::InvalidEscapeParams);
            }
            if guardian.is_zero() || guardian == ctx.account {
                return Err(AccountError::InvalidGuardianAddress);
            }
        } else if config.security_period != 0 || config.expiry_period != 0 || !guardian.is_zero()
        {
            return Err(AccountError::InvalidEscapeParams);
        }

        log::info!(
            "external recovery {} for {}",
            if config.is_enabled { "enabled" } else { "disabled" },
            ctx.account
        );
        self.config = config;
        self.guardian = guardian;
        Ok(())
    }

    /// Starts a recovery of `call`. Guardian only.
    ///
    /// A `Ready` recovery being replaced is reported as canceled.
    ///
    /// # Errors
    /// - [`AccountError::OnlyGuardian`] if the caller is not the guardian.
    /// - [`AccountError::EscapeDisabled`] while recovery is off.
    /// - [`AccountError::InvalidEscapeSelector`] for selectors off the allow-list.
    pub fn trigger_escape(
        &mut self,
        ctx: &CallContext,
        call: &EscapeCall,
    ) -> AccountResult<Vec<RecoveryEvent>> {
        if !self.config.is_enabled {
            return Err(AccountError::EscapeDisabled);
        }
        if ctx.caller != self.guardian {
            return Err(AccountError::OnlyGuardian);
        }
        if !is_recovery_selector(call.selector) {
            return Err(AccountError::InvalidEscapeSelector);
        }

        let mut events = Vec::with_capacity(2);
        if self.status(ctx.now) == EscapeStatus::Ready {
            events.push(RecoveryEvent::EscapeCanceled {
                call_hash: self.escape.call_hash,
            });
        }
        let call_hash = call.hash();
        let ready_at = ctx.now.saturating_add(self.config.security_period);
        self.escape = RecoveryEscape {
            ready_at,
            call_hash,
        };
        log::info!("recovery triggered for {}, ready at {ready_at}", ctx.account);
        events.push(RecoveryEvent::EscapeTriggered {
            ready_at,
            call_hash,
        });
        Ok(events)
    }

    /// Executes a ready recovery. Open to any caller.
    ///
    /// # Errors
    /// - [`AccountError::EscapeDisabled`] while recovery is off.
    /// - [`AccountError::EscapeNotReady`] before the security period elapsed.
    /// - [`AccountError::InvalidEscape`] when nothing is pending or it expired.
    /// - [`AccountError::InvalidEscapeCall`] if `call` is not the triggered action.
    /// - Any error of [`RecoveryHost::apply_recovered_action`].
    pub fn execute_escape<H: RecoveryHost + ?Sized>(
        &mut self,
        ctx: &CallContext,
        call: &EscapeCall,
        host: &mut H,
    ) -> AccountResult<RecoveryEvent> {
        if !self.config.is_enabled {
            return Err(AccountError::EscapeDisabled);
        }
        match self.status(ctx.now) {
            EscapeStatus::Ready => {}
            EscapeStatus::NotReady => return Err(AccountError::EscapeNotReady),
            EscapeStatus::None | EscapeStatus::Expired => return Err(AccountError::InvalidEscape),
        }
        let call_hash = call.hash();
        if call_hash != self.escape.call_hash {
            return Err(AccountError::InvalidEscapeCall);
        }

        self.escape = RecoveryEscape::default();
        host.apply_recovered_action(call)?;
        log::info!("recovery executed for {}", ctx.account);
        Ok(RecoveryEvent::EscapeExecuted { call_hash })
    }

    /// Cancels any pending recovery. Self-call only.
    ///
    /// Returns no event when the recovery had already expired.
    ///
    /// # Errors
    /// [`AccountError::OnlySelf`] or [`AccountError::InvalidEscape`] when nothing is pending.
    pub fn cancel_escape(&mut self, ctx: &CallContext) -> AccountResult<Option<RecoveryEvent>> {
        ctx.assert_only_self()?;
        let status = self.status(ctx.now);
        if status == EscapeStatus::None {
            return Err(AccountError::InvalidEscape);
        }
        let call_hash = self.escape.call_hash;
        self.escape = RecoveryEscape::default();
        Ok((status != EscapeStatus::Expired).then_some(RecoveryEvent::EscapeCanceled { call_hash }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, U256};

    const ACCOUNT: Address = address!("0x00000000000000000000000000000000000000a1");
    const GUARDIAN: Address = address!("0x00000000000000000000000000000000000000b2");
    const T0: u64 = 1_000;

    #[derive(Default)]
    struct MockHost {
        applied: Vec<EscapeCall>,
    }

    impl RecoveryHost for MockHost {
        fn apply_recovered_action(&mut self, call: &EscapeCall) -> AccountResult<()> {
            self.applied.push(call.clone());
            Ok(())
        }
    }

    fn ctx(caller: Address, now: u64) -> CallContext {
        CallContext {
            caller,
            account: ACCOUNT,
            now,
        }
    }

    fn enabled() -> ExternalRecovery {
        let mut recovery = ExternalRecovery::default();
        recovery
            .toggle_escape(
                &ctx(ACCOUNT, T0),
                RecoveryConfig {
                    is_enabled: true,
                    security_period: 100,
                    expiry_period: 50,
                },
                GUARDIAN,
            )
            .unwrap();
        recovery
    }

    fn replace_call() -> EscapeCall {
        EscapeCall::new(selector("replace_signer"), vec![U256::from(1), U256::from(2)])
    }

    #[test]
    fn test_toggle_rejects_half_configuration() {
        let mut recovery = ExternalRecovery::default();
        let half = RecoveryConfig {
            is_enabled: true,
            security_period: 100,
            expiry_period: 0,
        };
        assert_eq!(
            recovery.toggle_escape(&ctx(ACCOUNT, T0), half, GUARDIAN),
            Err(AccountError::InvalidEscapeParams)
        );
        let disable_with_guardian = RecoveryConfig::default();
        assert_eq!(
            recovery.toggle_escape(&ctx(ACCOUNT, T0), disable_with_guardian, GUARDIAN),
            Err(AccountError::InvalidEscapeParams)
        );
        let full = RecoveryConfig {
            is_enabled: true,
            security_period: 1,
            expiry_period: 1,
        };
        assert_eq!(
            recovery.toggle_escape(&ctx(ACCOUNT, T0), full, ACCOUNT),
            Err(AccountError::InvalidGuardianAddress)
        );
        assert_eq!(
            recovery.toggle_escape(&ctx(GUARDIAN, T0), full, GUARDIAN),
            Err(AccountError::OnlySelf)
        );
    }

    #[test]
    fn test_trigger_requires_guardian_and_allowed_selector() {
        let mut recovery = enabled();
        assert_eq!(
            recovery.trigger_escape(&ctx(ACCOUNT, T0), &replace_call()),
            Err(AccountError::OnlyGuardian)
        );
        assert_eq!(
            recovery.trigger_escape(
                &ctx(GUARDIAN, T0),
                &EscapeCall::new(selector("upgrade"), vec![])
            ),
            Err(AccountError::InvalidEscapeSelector)
        );
        assert_eq!(
            ExternalRecovery::default().trigger_escape(&ctx(GUARDIAN, T0), &replace_call()),
            Err(AccountError::EscapeDisabled)
        );
    }

    #[test]
    fn test_execute_lifecycle() {
        let mut recovery = enabled();
        let mut host = MockHost::default();
        let call = replace_call();
        let events = recovery.trigger_escape(&ctx(GUARDIAN, T0), &call).unwrap();
        assert_eq!(
            events,
            vec![RecoveryEvent::EscapeTriggered {
                ready_at: T0 + 100,
                call_hash: call.hash()
            }]
        );

        let anyone = address!("0x00000000000000000000000000000000000000c3");
        assert_eq!(
            recovery.execute_escape(&ctx(anyone, T0 + 99), &call, &mut host),
            Err(AccountError::EscapeNotReady)
        );
        let other = EscapeCall::new(call.selector, vec![U256::from(1), U256::from(3)]);
        assert_eq!(
            recovery.execute_escape(&ctx(anyone, T0 + 100), &other, &mut host),
            Err(AccountError::InvalidEscapeCall)
        );
        assert_eq!(
            recovery.execute_escape(&ctx(anyone, T0 + 100), &call, &mut host),
            Ok(RecoveryEvent::EscapeExecuted {
                call_hash: call.hash()
            })
        );
        assert_eq!(host.applied, vec![call.clone()]);
        assert_eq!(recovery.get_escape(T0 + 100).1, EscapeStatus::None);
        assert_eq!(
            recovery.execute_escape(&ctx(anyone, T0 + 100), &call, &mut host),
            Err(AccountError::InvalidEscape)
        );
    }

    #[test]
    fn test_replacing_ready_escape_reports_cancel() {
        let mut recovery = enabled();
        let first = replace_call();
        recovery.trigger_escape(&ctx(GUARDIAN, T0), &first).unwrap();
        let second = EscapeCall::new(selector("change_threshold"), vec![U256::from(1)]);
        let events = recovery
            .trigger_escape(&ctx(GUARDIAN, T0 + 100), &second)
            .unwrap();
        assert_eq!(
            events[0],
            RecoveryEvent::EscapeCanceled {
                call_hash: first.hash()
            }
        );
        assert_eq!(recovery.get_escape(T0 + 100).0.call_hash, second.hash());
    }

    #[test]
    fn test_toggle_blocked_while_escape_ongoing() {
        let mut recovery = enabled();
        recovery
            .trigger_escape(&ctx(GUARDIAN, T0), &replace_call())
            .unwrap();
        assert_eq!(
            recovery.toggle_escape(&ctx(ACCOUNT, T0 + 1), RecoveryConfig::default(), Address::ZERO),
            Err(AccountError::OngoingEscape)
        );
        // Expired at T0 + 150.
        recovery
            .toggle_escape(&ctx(ACCOUNT, T0 + 150), RecoveryConfig::default(), Address::ZERO)
            .unwrap();
        assert_eq!(recovery.guardian(), Address::ZERO);
        assert_eq!(recovery.get_escape(T0 + 150).0, RecoveryEscape::default());
    }

    #[test]
    fn test_cancel() {
        let mut recovery = enabled();
        assert_eq!(
            recovery.cancel_escape(&ctx(ACCOUNT, T0)),
            Err(AccountError::InvalidEscape)
        );
        let call = replace_call();
        recovery.trigger_escape(&ctx(GUARDIAN, T0), &call).unwrap();
        assert_eq!(
            recovery.cancel_escape(&ctx(ACCOUNT, T0 + 1)),
            Ok(Some(RecoveryEvent::EscapeCanceled {
                call_hash: call.hash()
            }))
        );

        recovery.trigger_escape(&ctx(GUARDIAN, T0), &call).unwrap();
        assert_eq!(recovery.cancel_escape(&ctx(ACCOUNT, T0 + 500)), Ok(None));
    }
}
