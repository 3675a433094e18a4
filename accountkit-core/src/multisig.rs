//! Threshold multisig account.
//!
//! Any `threshold` of the listed signers authorize a transaction, with their
//! signatures sorted by strictly increasing GUID. The signer list can also be
//! changed by an external recovery guardian through [`ExternalRecovery`].

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::account::{Host, Transaction};
use crate::codec::decode_all;
use crate::config::RecoveryConfig;
use crate::error::{AccountError, AccountResult};
use crate::escape::EscapeStatus;
use crate::events::AccountEvent;
use crate::guards::{assert_correct_tx_version, assert_only_protocol, assert_only_self, CallContext};
use crate::persistence;
use crate::primitives::{selector, Call, Felt, Guid, VALIDATED};
use crate::recovery::{EscapeCall, ExternalRecovery, RecoveryEscape, RecoveryHost};
use crate::registry::SignerRegistry;
use crate::signer::{Signer, SignerSignature};
use crate::validator::parse_signatures;

/// Entry points reachable through a call to the multisig itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum MultisigEntrypoint {
    /// `add_signers(new_threshold, Vec<Signer>)`.
    AddSigners,
    /// `remove_signers(new_threshold, Vec<Guid>)`.
    RemoveSigners,
    /// `replace_signer(signer_to_remove, signer_to_add)`.
    ReplaceSigner,
    /// `change_threshold(new_threshold)`.
    ChangeThreshold,
    /// `toggle_escape(RecoveryConfig, guardian)`.
    ToggleEscape,
    /// `cancel_escape()`.
    CancelEscape,
}

impl MultisigEntrypoint {
    /// Selector of the entry point.
    #[must_use]
    pub fn selector(self) -> Felt {
        selector(&self.to_string())
    }

    /// Entry point with `value` as selector, if any.
    #[must_use]
    pub fn from_selector(value: Felt) -> Option<Self> {
        Self::iter().find(|entrypoint| entrypoint.selector() == value)
    }
}

/// Ordered signer GUIDs and the threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SignerList {
    signers: Vec<Guid>,
    threshold: u32,
    registry: SignerRegistry,
}

impl SignerList {
    fn assert_valid_threshold(&self, threshold: u32) -> AccountResult<()> {
        let count = u32::try_from(self.signers.len()).map_err(|_| AccountError::BadThreshold)?;
        if threshold == 0 || threshold > count {
            return Err(AccountError::BadThreshold);
        }
        Ok(())
    }

    fn contains(&self, guid: &Guid) -> bool {
        self.signers.contains(guid)
    }

    fn link(&mut self, signer: &Signer, events: &mut Vec<AccountEvent>) -> AccountResult<Guid> {
        let signer_guid = self.registry.register(signer)?;
        if self.contains(&signer_guid) {
            return Err(AccountError::AlreadyASigner);
        }
        events.push(AccountEvent::SignerLinked {
            signer_guid,
            signer: signer.clone(),
        });
        Ok(signer_guid)
    }

    fn set_threshold(&mut self, new_threshold: u32, events: &mut Vec<AccountEvent>) -> AccountResult<()> {
        self.assert_valid_threshold(new_threshold)?;
        if new_threshold != self.threshold {
            self.threshold = new_threshold;
            events.push(AccountEvent::ThresholdUpdated { new_threshold });
        }
        Ok(())
    }

    fn add_signers(
        &mut self,
        new_threshold: u32,
        signers: &[Signer],
        events: &mut Vec<AccountEvent>,
    ) -> AccountResult<()> {
        for signer in signers {
            let signer_guid = self.link(signer, events)?;
            self.signers.push(signer_guid);
            events.push(AccountEvent::SignerAdded { signer_guid });
        }
        self.set_threshold(new_threshold, events)
    }

    fn remove_signers(
        &mut self,
        new_threshold: u32,
        guids: &[Guid],
        events: &mut Vec<AccountEvent>,
    ) -> AccountResult<()> {
        for signer_guid in guids {
            let position = self
                .signers
                .iter()
                .position(|guid| guid == signer_guid)
                .ok_or(AccountError::NotASigner)?;
            self.signers.remove(position);
            events.push(AccountEvent::SignerRemoved {
                signer_guid: *signer_guid,
            });
        }
        self.set_threshold(new_threshold, events)
    }

    fn replace_signer(
        &mut self,
        to_remove: Guid,
        to_add: &Signer,
        events: &mut Vec<AccountEvent>,
    ) -> AccountResult<()> {
        let position = self
            .signers
            .iter()
            .position(|guid| *guid == to_remove)
            .ok_or(AccountError::NotASigner)?;
        let signer_guid = self.link(to_add, events)?;
        self.signers[position] = signer_guid;
        events.push(AccountEvent::SignerRemoved {
            signer_guid: to_remove,
        });
        events.push(AccountEvent::SignerAdded { signer_guid });
        Ok(())
    }

    /// Exactly `threshold` valid signatures from listed signers, by increasing GUID.
    fn assert_valid_signatures(&self, hash: Felt, signatures: &[SignerSignature]) -> AccountResult<()> {
        if u32::try_from(signatures.len()).ok() != Some(self.threshold) {
            return Err(AccountError::InvalidSignatureLength);
        }
        let mut last: Option<Guid> = None;
        for signature in signatures {
            let guid = signature.signer_guid();
            if !self.contains(&guid) {
                return Err(AccountError::NotASigner);
            }
            if last.is_some_and(|last| guid <= last) {
                return Err(AccountError::SignaturesNotSorted);
            }
            if !signature.is_valid_signature(hash) {
                return Err(AccountError::InvalidSignature);
            }
            last = Some(guid);
        }
        Ok(())
    }

    fn apply(&mut self, call: &EscapeCall, events: &mut Vec<AccountEvent>) -> AccountResult<()> {
        let entrypoint =
            MultisigEntrypoint::from_selector(call.selector).ok_or(AccountError::EntrypointNotFound)?;
        match entrypoint {
            MultisigEntrypoint::AddSigners => {
                let (threshold, signers): (u32, Vec<Signer>) = decode_all(&call.calldata)?;
                self.add_signers(threshold, &signers, events)
            }
            MultisigEntrypoint::RemoveSigners => {
                let (threshold, guids): (u32, Vec<Guid>) = decode_all(&call.calldata)?;
                self.remove_signers(threshold, &guids, events)
            }
            MultisigEntrypoint::ReplaceSigner => {
                let (to_remove, to_add): (Guid, Signer) = decode_all(&call.calldata)?;
                self.replace_signer(to_remove, &to_add, events)
            }
            MultisigEntrypoint::ChangeThreshold => {
                let threshold: u32 = decode_all(&call.calldata)?;
                self.set_threshold(threshold, events)
            }
            MultisigEntrypoint::ToggleEscape | MultisigEntrypoint::CancelEscape => {
                Err(AccountError::InvalidEscapeSelector)
            }
        }
    }
}

/// Applies recovered actions to the signer list, collecting their events.
struct SignerListRecovery<'a> {
    signer_list: &'a mut SignerList,
    events: Vec<AccountEvent>,
}

impl RecoveryHost for SignerListRecovery<'_> {
    fn apply_recovered_action(&mut self, call: &EscapeCall) -> AccountResult<()> {
        self.signer_list.apply(call, &mut self.events)
    }
}

/// Everything a [`MultisigAccount`] persists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigState {
    signer_list: SignerList,
    recovery: ExternalRecovery,
}

impl MultisigState {
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
    /// [`AccountError::SerializationError`], [`AccountError::UnsupportedStateVersion`]
    /// or [`AccountError::BadThreshold`] for a threshold the signer list cannot meet.
    pub fn from_bytes(bytes: &[u8]) -> AccountResult<Self> {
        let state: Self = persistence::deserialize(bytes)?;
        state.signer_list.assert_valid_threshold(state.signer_list.threshold)?;
        Ok(state)
    }
}

/// Threshold multisig account with external recovery.
#[derive(Debug, Clone)]
pub struct MultisigAccount {
    address: Address,
    state: MultisigState,
    events: Vec<AccountEvent>,
}

impl MultisigAccount {
    /// Deploys a multisig controlled by `threshold` of `signers`.
    ///
    /// # Errors
    /// [`AccountError::InvalidSigner`], [`AccountError::AlreadyASigner`] or
    /// [`AccountError::BadThreshold`].
    pub fn new(address: Address, threshold: u32, signers: &[Signer]) -> AccountResult<Self> {
        let mut state = MultisigState::default();
        let mut events = Vec::new();
        state.signer_list.add_signers(threshold, signers, &mut events)?;
        log::info!("multisig {address} created with threshold {threshold}");
        Ok(Self {
            address,
            state,
            events,
        })
    }

    /// Reopens a multisig from persisted state.
    #[must_use]
    pub const fn restore(address: Address, state: MultisigState) -> Self {
        Self {
            address,
            state,
            events: Vec::new(),
        }
    }

    /// Address of the multisig.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Persistent state.
    #[must_use]
    pub const fn state(&self) -> &MultisigState {
        &self.state
    }

    /// Events of committed entry points since the last [`Self::take_events`].
    #[must_use]
    pub fn events(&self) -> &[AccountEvent] {
        &self.events
    }

    /// Drains the event log.
    pub fn take_events(&mut self) -> Vec<AccountEvent> {
        std::mem::take(&mut self.events)
    }

    fn atomically<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> AccountResult<T>,
    ) -> AccountResult<T> {
        let snapshot = self.state.clone();
        let event_count = self.events.len();
        let result = f(self);
        if result.is_err() {
            self.state = snapshot;
            self.events.truncate(event_count);
        }
        result
    }

    const fn context(&self, caller: Address, now: u64) -> CallContext {
        CallContext {
            caller,
            account: self.address,
            now,
        }
    }

    /// Validate phase: `threshold` sorted signatures over the transaction hash.
    ///
    /// # Errors
    /// [`AccountError::NonNullCaller`], [`AccountError::InvalidTxVersion`] or any
    /// signature error.
    pub fn validate(&self, caller: Address, tx: &Transaction) -> AccountResult<Felt> {
        assert_only_protocol(caller)?;
        assert_correct_tx_version(tx.version)?;
        let signatures = parse_signatures(&tx.signature)?;
        self.state
            .signer_list
            .assert_valid_signatures(tx.hash, &signatures)?;
        Ok(VALIDATED)
    }

    /// Execute phase.
    ///
    /// # Errors
    /// [`AccountError::NonNullCaller`], [`AccountError::InvalidTxVersion`] or the
    /// first failing call's error.
    pub fn execute(
        &mut self,
        host: &mut dyn Host,
        caller: Address,
        tx: &Transaction,
    ) -> AccountResult<Vec<Vec<Felt>>> {
        self.atomically(|account| {
            assert_only_protocol(caller)?;
            assert_correct_tx_version(tx.version)?;
            let mut response = Vec::with_capacity(tx.calls.len());
            for call in &tx.calls {
                let data = if call.to == account.address {
                    account.dispatch_self_call(host, call)?
                } else {
                    host.call_contract(call)?
                };
                response.push(data);
            }
            account.events.push(AccountEvent::TransactionExecuted {
                hash: tx.hash,
                response: response.clone(),
            });
            Ok(response)
        })
    }

    /// Validate, then execute.
    ///
    /// # Errors
    /// The error of whichever phase failed.
    pub fn submit(&mut self, host: &mut dyn Host, tx: &Transaction) -> AccountResult<Vec<Vec<Felt>>> {
        self.validate(Address::ZERO, tx)?;
        self.execute(host, Address::ZERO, tx)
    }

    fn dispatch_self_call(&mut self, host: &dyn Host, call: &Call) -> AccountResult<Vec<Felt>> {
        let entrypoint =
            MultisigEntrypoint::from_selector(call.selector).ok_or(AccountError::EntrypointNotFound)?;
        let caller = self.address;
        match entrypoint {
            MultisigEntrypoint::ToggleEscape => {
                let (config, guardian): (RecoveryConfig, Address) = decode_all(&call.calldata)?;
                self.toggle_escape(host, caller, config, guardian)?;
            }
            MultisigEntrypoint::CancelEscape => {
                decode_all::<()>(&call.calldata)?;
                self.cancel_escape(host, caller)?;
            }
            _ => {
                let action = EscapeCall::new(call.selector, call.calldata.clone());
                self.apply_self_action(caller, &action)?;
            }
        }
        Ok(Vec::new())
    }

    fn apply_self_action(&mut self, caller: Address, action: &EscapeCall) -> AccountResult<()> {
        assert_only_self(caller, self.address)?;
        self.atomically(|account| {
            let mut events = Vec::new();
            account.state.signer_list.apply(action, &mut events)?;
            account.events.extend(events);
            Ok(())
        })
    }

    /// Adds signers and sets the new threshold. Self-call only.
    ///
    /// # Errors
    /// [`AccountError::OnlySelf`], [`AccountError::InvalidSigner`],
    /// [`AccountError::AlreadyASigner`] or [`AccountError::BadThreshold`].
    pub fn add_signers(
        &mut self,
        caller: Address,
        new_threshold: u32,
        signers: &[Signer],
    ) -> AccountResult<()> {
        assert_only_self(caller, self.address)?;
        self.atomically(|account| {
            let mut events = Vec::new();
            account
                .state
                .signer_list
                .add_signers(new_threshold, signers, &mut events)?;
            account.events.extend(events);
            Ok(())
        })
    }

    /// Removes signers and sets the new threshold. Self-call only.
    ///
    /// # Errors
    /// [`AccountError::OnlySelf`], [`AccountError::NotASigner`] or [`AccountError::BadThreshold`].
    pub fn remove_signers(
        &mut self,
        caller: Address,
        new_threshold: u32,
        guids: &[Guid],
    ) -> AccountResult<()> {
        assert_only_self(caller, self.address)?;
        self.atomically(|account| {
            let mut events = Vec::new();
            account
                .state
                .signer_list
                .remove_signers(new_threshold, guids, &mut events)?;
            account.events.extend(events);
            Ok(())
        })
    }

    /// Replaces one signer in place. Self-call only.
    ///
    /// # Errors
    /// [`AccountError::OnlySelf`], [`AccountError::NotASigner`],
    /// [`AccountError::InvalidSigner`] or [`AccountError::AlreadyASigner`].
    pub fn replace_signer(
        &mut self,
        caller: Address,
        to_remove: Guid,
        to_add: &Signer,
    ) -> AccountResult<()> {
        assert_only_self(caller, self.address)?;
        self.atomically(|account| {
            let mut events = Vec::new();
            account
                .state
                .signer_list
                .replace_signer(to_remove, to_add, &mut events)?;
            account.events.extend(events);
            Ok(())
        })
    }

    /// Changes the threshold. Self-call only.
    ///
    /// # Errors
    /// [`AccountError::OnlySelf`] or [`AccountError::BadThreshold`].
    pub fn change_threshold(&mut self, caller: Address, new_threshold: u32) -> AccountResult<()> {
        assert_only_self(caller, self.address)?;
        let mut events = Vec::new();
        self.state
            .signer_list
            .set_threshold(new_threshold, &mut events)?;
        self.events.extend(events);
        Ok(())
    }

    /// Enables or disables external recovery. Self-call only.
    ///
    /// # Errors
    /// See [`ExternalRecovery::toggle_escape`].
    pub fn toggle_escape(
        &mut self,
        host: &dyn Host,
        caller: Address,
        config: RecoveryConfig,
        guardian: Address,
    ) -> AccountResult<()> {
        let ctx = self.context(caller, host.block_timestamp());
        self.state.recovery.toggle_escape(&ctx, config, guardian)
    }

    /// Starts a recovery. Recovery guardian only.
    ///
    /// # Errors
    /// See [`ExternalRecovery::trigger_escape`].
    pub fn trigger_escape(
        &mut self,
        host: &dyn Host,
        caller: Address,
        call: &EscapeCall,
    ) -> AccountResult<()> {
        let ctx = self.context(caller, host.block_timestamp());
        let events = self.state.recovery.trigger_escape(&ctx, call)?;
        self.events.extend(events.into_iter().map(AccountEvent::from));
        Ok(())
    }

    /// Executes a ready recovery against the signer list. Open to any caller.
    ///
    /// # Errors
    /// See [`ExternalRecovery::execute_escape`], plus any error of the recovered action.
    pub fn execute_escape(
        &mut self,
        host: &dyn Host,
        caller: Address,
        call: &EscapeCall,
    ) -> AccountResult<()> {
        let ctx = self.context(caller, host.block_timestamp());
        self.atomically(|account| {
            let MultisigState {
                signer_list,
                recovery,
            } = &mut account.state;
            let mut applier = SignerListRecovery {
                signer_list,
                events: Vec::new(),
            };
            let executed = recovery.execute_escape(&ctx, call, &mut applier)?;
            let events = applier.events;
            account.events.extend(events);
            account.events.push(executed.into());
            Ok(())
        })
    }

    /// Cancels any pending recovery. Self-call only.
    ///
    /// # Errors
    /// See [`ExternalRecovery::cancel_escape`].
    pub fn cancel_escape(&mut self, host: &dyn Host, caller: Address) -> AccountResult<()> {
        let ctx = self.context(caller, host.block_timestamp());
        if let Some(event) = self.state.recovery.cancel_escape(&ctx)? {
            self.events.push(event.into());
        }
        Ok(())
    }

    /// Signer GUIDs in list order.
    #[must_use]
    pub fn signers(&self) -> &[Guid] {
        &self.state.signer_list.signers
    }

    /// Key material of a listed signer.
    #[must_use]
    pub fn signer(&self, guid: &Guid) -> Option<&Signer> {
        if self.is_signer(guid) {
            self.state.signer_list.registry.resolve(guid)
        } else {
            None
        }
    }

    /// Whether `guid` is listed.
    #[must_use]
    pub fn is_signer(&self, guid: &Guid) -> bool {
        self.state.signer_list.contains(guid)
    }

    /// Signatures needed per transaction.
    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.state.signer_list.threshold
    }

    /// Returns [`VALIDATED`] if `signature` meets the threshold for `hash`, zero otherwise.
    #[must_use]
    pub fn is_valid_signature(&self, hash: Felt, signature: &[Felt]) -> Felt {
        let valid = parse_signatures(signature).is_ok_and(|signatures| {
            self.state
                .signer_list
                .assert_valid_signatures(hash, &signatures)
                .is_ok()
        });
        if valid {
            VALIDATED
        } else {
            U256::ZERO
        }
    }

    /// The pending recovery and its status at `now`.
    #[must_use]
    pub const fn get_escape(&self, now: u64) -> (RecoveryEscape, EscapeStatus) {
        self.state.recovery.get_escape(now)
    }

    /// Recovery configuration.
    #[must_use]
    pub const fn get_escape_config(&self) -> RecoveryConfig {
        self.state.recovery.get_escape_config()
    }

    /// Address allowed to trigger recoveries.
    #[must_use]
    pub const fn recovery_guardian(&self) -> Address {
        self.state.recovery.guardian()
    }
}
