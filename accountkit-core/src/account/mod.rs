//! Owner/guardian smart account.
//!
//! [`SmartAccount`] owns the authorization state, routes the two transaction
//! phases, applies self-authorized mutators and answers queries. Every entry
//! point is atomic: on `Err` the state and the event log are left untouched.

mod entrypoint;
mod state;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

pub use entrypoint::Entrypoint;
pub use state::AccountState;

use crate::config::AccountConfig;
use crate::error::{AccountError, AccountResult};
use crate::escape::{Escape, EscapeAttempts, EscapeRole, EscapeStatus, EscapeType};
use crate::events::AccountEvent;
use crate::guards::{
    assert_correct_tx_version, assert_no_self_call, assert_only_protocol, assert_only_self,
};
use crate::outside_execution::OutsideExecution;
use crate::primitives::{address_to_felt, hash_on_elements, Call, Felt, Guid, VALIDATED};
use crate::signer::{Signer, SignerSignature};
use crate::validator::{
    assert_valid_guardian_only, assert_valid_owner_only, assert_valid_signature_set,
    is_valid_signature_set, parse_signatures,
};

/// The chain an account runs on, as seen from inside one entry point.
pub trait Host {
    /// Current block timestamp in seconds.
    fn block_timestamp(&self) -> u64;

    /// Calls another contract and returns its return data.
    ///
    /// # Errors
    /// Any error reverts the calling entry point.
    fn call_contract(&mut self, call: &Call) -> AccountResult<Vec<Felt>>;
}

/// A transaction as handed to the account by the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Calls to execute, in order.
    pub calls: Vec<Call>,
    /// Encoded list of signer signatures over `hash`.
    pub signature: Vec<Felt>,
    /// Transaction hash.
    pub hash: Felt,
    /// Transaction version, see [`crate::guards::TX_V3`].
    pub version: Felt,
    /// Highest fee the submitter agreed to pay.
    pub max_fee: u128,
}

/// Guardian-protected account.
#[derive(Debug, Clone)]
pub struct SmartAccount {
    address: Address,
    config: AccountConfig,
    state: AccountState,
    events: Vec<AccountEvent>,
}

impl SmartAccount {
    /// Deploys an account controlled by `owner`, optionally protected by `guardian`.
    ///
    /// # Errors
    /// [`AccountError::InvalidSigner`] if a signer's key material is malformed.
    pub fn new(
        address: Address,
        config: AccountConfig,
        owner: &Signer,
        guardian: Option<&Signer>,
    ) -> AccountResult<Self> {
        let state = AccountState::new(owner, guardian)?;
        let mut account = Self {
            address,
            config,
            state,
            events: Vec::new(),
        };
        account.emit_signer_linked(owner);
        if let Some(guardian) = guardian {
            account.emit_signer_linked(guardian);
        }
        account.emit(AccountEvent::AccountCreated {
            owner_guid: account.state.owner,
            guardian_guid: account.state.guardian,
        });
        log::info!("account {address} created");
        Ok(account)
    }

    /// Reopens an account from persisted state.
    ///
    /// # Errors
    /// [`AccountError::NullOwner`] or [`AccountError::BackupShouldBeNull`] if the
    /// state breaks an invariant.
    pub fn restore(
        address: Address,
        config: AccountConfig,
        state: AccountState,
    ) -> AccountResult<Self> {
        state.check_invariants()?;
        Ok(Self {
            address,
            config,
            state,
            events: Vec::new(),
        })
    }

    /// Address of the account.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Account constants.
    #[must_use]
    pub const fn config(&self) -> &AccountConfig {
        &self.config
    }

    /// Persistent state.
    #[must_use]
    pub const fn state(&self) -> &AccountState {
        &self.state
    }

    /// Events emitted by committed entry points since the last [`Self::take_events`].
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
        if let Err(err) = &result {
            log::debug!("{} reverted: {err}", self.address);
            self.state = snapshot;
            self.events.truncate(event_count);
        }
        result
    }

    fn emit(&mut self, event: AccountEvent) {
        self.events.push(event);
    }

    fn emit_signer_linked(&mut self, signer: &Signer) {
        self.emit(AccountEvent::SignerLinked {
            signer_guid: signer.guid(),
            signer: signer.clone(),
        });
    }

    fn link_signer(&mut self, signer: &Signer) -> AccountResult<Guid> {
        let guid = self.state.signers.register(signer)?;
        self.emit_signer_linked(signer);
        Ok(guid)
    }

    fn reset_escape(&mut self, now: u64) {
        self.state.escape_candidate = None;
        if self.state.escape.clear(now, self.config.escape_expiry_period) {
            self.emit(AccountEvent::EscapeCanceled);
        }
    }

    // Transaction lifecycle

    /// Validate phase: checks signatures against the policy of the called entry points.
    ///
    /// A sole self-call to an escape entry point needs only the signing role's
    /// signature and counts one throttled attempt. The counter update is the
    /// only state change this phase commits.
    ///
    /// # Errors
    /// Any authorization, throttling or structural error; see [`AccountError`].
    pub fn validate(&mut self, caller: Address, tx: &Transaction) -> AccountResult<Felt> {
        self.atomically(|account| {
            assert_only_protocol(caller)?;
            assert_correct_tx_version(tx.version)?;
            account.assert_valid_calls_and_signature(
                &tx.calls,
                tx.hash,
                &tx.signature,
                Some(tx.max_fee),
            )?;
            log::debug!("{} validated transaction {}", account.address, tx.hash);
            Ok(VALIDATED)
        })
    }

    /// Execute phase: runs the calls and records [`AccountEvent::TransactionExecuted`].
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
            let response = account.execute_calls(host, &tx.calls)?;
            account.emit(AccountEvent::TransactionExecuted {
                hash: tx.hash,
                response: response.clone(),
            });
            Ok(response)
        })
    }

    /// Runs a transaction the way the protocol does: validate, then execute.
    ///
    /// A failing execute phase keeps what the validate phase committed.
    ///
    /// # Errors
    /// The error of whichever phase failed.
    pub fn submit(
        &mut self,
        host: &mut dyn Host,
        tx: &Transaction,
    ) -> AccountResult<Vec<Vec<Felt>>> {
        self.validate(Address::ZERO, tx)?;
        self.execute(host, Address::ZERO, tx)
    }

    /// Executes a bundle signed off-chain, submitted by `caller`.
    ///
    /// Escape entry points as the sole call need only their signing role and
    /// are not throttled.
    ///
    /// # Errors
    /// Caller, time window and nonce errors from [`OutsideExecution`], any
    /// signature error, or the first failing call's error.
    pub fn execute_from_outside(
        &mut self,
        host: &mut dyn Host,
        caller: Address,
        outside: &OutsideExecution,
        signature: &[Felt],
    ) -> AccountResult<Vec<Vec<Felt>>> {
        self.atomically(|account| {
            outside.assert_executable(caller, host.block_timestamp())?;
            account.state.outside_nonces.consume(outside.nonce)?;
            let hash = outside.message_hash(account.config.chain_id, account.address);
            account.assert_valid_calls_and_signature(&outside.calls, hash, signature, None)?;
            let response = account.execute_calls(host, &outside.calls)?;
            account.emit(AccountEvent::TransactionExecuted {
                hash,
                response: response.clone(),
            });
            log::debug!("{} executed outside bundle from {caller}", account.address);
            Ok(response)
        })
    }

    /// `max_fee` is `Some` for throttled (protocol) transactions.
    fn assert_valid_calls_and_signature(
        &mut self,
        calls: &[Call],
        hash: Felt,
        signature: &[Felt],
        max_fee: Option<u128>,
    ) -> AccountResult<()> {
        let signatures = parse_signatures(signature)?;
        let escape_call = match calls {
            [call] if call.to == self.address => Entrypoint::from_selector(call.selector)
                .and_then(|entrypoint| entrypoint.escape_role().map(|role| (entrypoint, role, call))),
            [_] => None,
            _ => {
                assert_no_self_call(calls, self.address)?;
                None
            }
        };

        let Some((entrypoint, role, call)) = escape_call else {
            return assert_valid_signature_set(&self.state, hash, &signatures);
        };
        if self.state.guardian.is_none() {
            return Err(AccountError::GuardianRequired);
        }
        if let Some(max_fee) = max_fee {
            self.state
                .escape
                .consume_attempt(role, max_fee, &self.config)?;
        }
        entrypoint.check_escape_calldata(&call.calldata)?;
        match role {
            EscapeRole::Owner => assert_valid_owner_only(&self.state, hash, &signatures),
            EscapeRole::Guardian => assert_valid_guardian_only(&self.state, hash, &signatures),
        }
    }

    fn execute_calls(
        &mut self,
        host: &mut dyn Host,
        calls: &[Call],
    ) -> AccountResult<Vec<Vec<Felt>>> {
        let mut response = Vec::with_capacity(calls.len());
        for call in calls {
            let data = if call.to == self.address {
                self.dispatch_self_call(host, call)?
            } else {
                host.call_contract(call)?
            };
            response.push(data);
        }
        Ok(response)
    }

    // Self-authorized mutators

    /// Message the new owner signs in [`Self::change_owner`].
    #[must_use]
    pub fn change_owner_message_hash(&self) -> Felt {
        hash_on_elements(&[
            Entrypoint::ChangeOwner.selector(),
            self.config.chain_id,
            address_to_felt(self.address),
            self.state.owner,
        ])
    }

    /// Replaces the owner. The new owner proves control of its key by signing
    /// [`Self::change_owner_message_hash`]. Cancels any live escape.
    ///
    /// # Errors
    /// [`AccountError::OnlySelf`], [`AccountError::InvalidSigner`] or
    /// [`AccountError::InvalidOwnerSignature`].
    pub fn change_owner(
        &mut self,
        host: &dyn Host,
        caller: Address,
        signer_signature: &SignerSignature,
    ) -> AccountResult<()> {
        assert_only_self(caller, self.address)?;
        self.atomically(|account| {
            let new_owner = signer_signature.signer();
            new_owner.validate()?;
            if !signer_signature.is_valid_signature(account.change_owner_message_hash()) {
                return Err(AccountError::InvalidOwnerSignature);
            }
            let new_owner_guid = account.link_signer(new_owner)?;
            account.state.owner = new_owner_guid;
            account.reset_escape(host.block_timestamp());
            account.state.escape.reset_attempts();
            account.emit(AccountEvent::OwnerChanged { new_owner_guid });
            log::info!("{} owner changed", account.address);
            Ok(())
        })
    }

    /// Sets or removes the guardian. Cancels any live escape.
    ///
    /// # Errors
    /// [`AccountError::OnlySelf`], [`AccountError::InvalidSigner`] or
    /// [`AccountError::BackupShouldBeNull`] when removing the guardian while a
    /// backup is set.
    pub fn change_guardian(
        &mut self,
        host: &dyn Host,
        caller: Address,
        new_guardian: Option<&Signer>,
    ) -> AccountResult<()> {
        assert_only_self(caller, self.address)?;
        self.atomically(|account| {
            let new_guardian_guid = new_guardian
                .map(|signer| account.link_signer(signer))
                .transpose()?;
            if new_guardian_guid.is_none() && account.state.guardian_backup.is_some() {
                return Err(AccountError::BackupShouldBeNull);
            }
            account.state.guardian = new_guardian_guid;
            account.reset_escape(host.block_timestamp());
            account.state.escape.reset_attempts();
            account.emit(AccountEvent::GuardianChanged { new_guardian_guid });
            Ok(())
        })
    }

    /// Sets or removes the guardian backup. Cancels any live escape.
    ///
    /// # Errors
    /// [`AccountError::OnlySelf`], [`AccountError::GuardianRequired`] or
    /// [`AccountError::InvalidSigner`].
    pub fn change_guardian_backup(
        &mut self,
        host: &dyn Host,
        caller: Address,
        new_backup: Option<&Signer>,
    ) -> AccountResult<()> {
        assert_only_self(caller, self.address)?;
        if self.state.guardian.is_none() {
            return Err(AccountError::GuardianRequired);
        }
        self.atomically(|account| {
            let new_guardian_backup_guid =
                new_backup.map(|signer| account.link_signer(signer)).transpose()?;
            account.state.guardian_backup = new_guardian_backup_guid;
            account.reset_escape(host.block_timestamp());
            account.state.escape.reset_attempts();
            account.emit(AccountEvent::GuardianBackupChanged {
                new_guardian_backup_guid,
            });
            Ok(())
        })
    }

    /// Starts replacing the owner with `new_owner`. Guardian-signed.
    ///
    /// # Errors
    /// [`AccountError::OnlySelf`], [`AccountError::GuardianRequired`],
    /// [`AccountError::InvalidSigner`] or [`AccountError::CannotOverrideEscape`]
    /// while a guardian escape is live.
    pub fn trigger_escape_owner(
        &mut self,
        host: &dyn Host,
        caller: Address,
        new_owner: &Signer,
    ) -> AccountResult<()> {
        assert_only_self(caller, self.address)?;
        if self.state.guardian.is_none() {
            return Err(AccountError::GuardianRequired);
        }
        new_owner.validate()?;
        self.atomically(|account| {
            let new_owner_guid = new_owner.guid();
            let triggered = account.state.escape.trigger(
                EscapeType::Owner,
                Some(new_owner_guid),
                host.block_timestamp(),
                &account.config,
            )?;
            if triggered.replaced_live_escape {
                account.emit(AccountEvent::EscapeCanceled);
            }
            account.emit(AccountEvent::EscapeOwnerTriggered {
                ready_at: triggered.ready_at,
                new_owner_guid,
            });
            account.state.escape_candidate = Some(new_owner.clone());
            log::info!(
                "{} owner escape triggered, ready at {}",
                account.address,
                triggered.ready_at
            );
            Ok(())
        })
    }

    /// Starts replacing (or, with `None`, removing) the guardian. Owner-signed.
    ///
    /// Always takes precedence over a pending owner escape.
    ///
    /// # Errors
    /// [`AccountError::OnlySelf`], [`AccountError::GuardianRequired`],
    /// [`AccountError::InvalidSigner`] or [`AccountError::BackupShouldBeNull`]
    /// when removing the guardian while a backup is set.
    pub fn trigger_escape_guardian(
        &mut self,
        host: &dyn Host,
        caller: Address,
        new_guardian: Option<&Signer>,
    ) -> AccountResult<()> {
        assert_only_self(caller, self.address)?;
        if self.state.guardian.is_none() {
            return Err(AccountError::GuardianRequired);
        }
        if new_guardian.is_none() && self.state.guardian_backup.is_some() {
            return Err(AccountError::BackupShouldBeNull);
        }
        if let Some(signer) = new_guardian {
            signer.validate()?;
        }
        self.atomically(|account| {
            let new_guardian_guid = new_guardian.map(Signer::guid);
            let triggered = account.state.escape.trigger(
                EscapeType::Guardian,
                new_guardian_guid,
                host.block_timestamp(),
                &account.config,
            )?;
            if triggered.replaced_live_escape {
                account.emit(AccountEvent::EscapeCanceled);
            }
            account.emit(AccountEvent::EscapeGuardianTriggered {
                ready_at: triggered.ready_at,
                new_guardian_guid,
            });
            account.state.escape_candidate = new_guardian.cloned();
            log::info!(
                "{} guardian escape triggered, ready at {}",
                account.address,
                triggered.ready_at
            );
            Ok(())
        })
    }

    /// Completes a ready owner escape.
    ///
    /// # Errors
    /// [`AccountError::OnlySelf`], escape status errors, or
    /// [`AccountError::NullNewOwner`] if the escape carries no known owner.
    pub fn escape_owner(&mut self, host: &dyn Host, caller: Address) -> AccountResult<()> {
        assert_only_self(caller, self.address)?;
        self.atomically(|account| {
            let escaped_guid = account.state.escape.complete(
                EscapeType::Owner,
                host.block_timestamp(),
                account.config.escape_expiry_period,
            )?;
            let new_owner = account
                .state
                .escape_candidate
                .take()
                .filter(|signer| Some(signer.guid()) == escaped_guid)
                .ok_or(AccountError::NullNewOwner)?;
            let new_owner_guid = account.link_signer(&new_owner)?;
            account.state.owner = new_owner_guid;
            account.emit(AccountEvent::OwnerEscaped { new_owner_guid });
            log::info!("{} owner escaped", account.address);
            Ok(())
        })
    }

    /// Completes a ready guardian escape.
    ///
    /// # Errors
    /// [`AccountError::OnlySelf`], escape status errors, or
    /// [`AccountError::BackupShouldBeNull`] when removing the guardian while a
    /// backup is set.
    pub fn escape_guardian(&mut self, host: &dyn Host, caller: Address) -> AccountResult<()> {
        assert_only_self(caller, self.address)?;
        self.atomically(|account| {
            let new_guardian_guid = account.state.escape.complete(
                EscapeType::Guardian,
                host.block_timestamp(),
                account.config.escape_expiry_period,
            )?;
            if new_guardian_guid.is_none() && account.state.guardian_backup.is_some() {
                return Err(AccountError::BackupShouldBeNull);
            }
            let new_guardian = account.state.escape_candidate.take();
            if new_guardian.as_ref().map(Signer::guid) != new_guardian_guid {
                return Err(AccountError::InvalidEscape);
            }
            if let Some(signer) = &new_guardian {
                account.link_signer(signer)?;
            }
            account.state.guardian = new_guardian_guid;
            account.emit(AccountEvent::GuardianEscaped { new_guardian_guid });
            log::info!("{} guardian escaped", account.address);
            Ok(())
        })
    }

    /// Cancels any pending escape. An expired escape lapses without an event.
    ///
    /// # Errors
    /// [`AccountError::OnlySelf`] or [`AccountError::InvalidEscape`] when nothing is pending.
    pub fn cancel_escape(&mut self, host: &dyn Host, caller: Address) -> AccountResult<()> {
        assert_only_self(caller, self.address)?;
        let status = self
            .state
            .escape
            .cancel(host.block_timestamp(), self.config.escape_expiry_period)?;
        self.state.escape_candidate = None;
        if status != EscapeStatus::Expired {
            self.emit(AccountEvent::EscapeCanceled);
        }
        Ok(())
    }

    // Queries

    /// GUID of the owner.
    #[must_use]
    pub const fn owner_guid(&self) -> Guid {
        self.state.owner
    }

    /// GUID of the guardian.
    #[must_use]
    pub const fn guardian_guid(&self) -> Option<Guid> {
        self.state.guardian
    }

    /// GUID of the guardian backup.
    #[must_use]
    pub const fn guardian_backup_guid(&self) -> Option<Guid> {
        self.state.guardian_backup
    }

    /// Key material of the owner.
    #[must_use]
    pub fn owner(&self) -> Option<&Signer> {
        self.state.signers.resolve(&self.state.owner)
    }

    /// Key material of the guardian.
    #[must_use]
    pub fn guardian(&self) -> Option<&Signer> {
        self.state
            .guardian
            .and_then(|guid| self.state.signers.resolve(&guid))
    }

    /// Key material of the guardian backup.
    #[must_use]
    pub fn guardian_backup(&self) -> Option<&Signer> {
        self.state
            .guardian_backup
            .and_then(|guid| self.state.signers.resolve(&guid))
    }

    /// The pending escape and its status at `now`.
    #[must_use]
    pub const fn get_escape(&self, now: u64) -> (Escape, EscapeStatus) {
        (
            self.state.escape.escape(),
            self.state.escape.status(now, self.config.escape_expiry_period),
        )
    }

    /// Throttled escape attempts per role.
    #[must_use]
    pub const fn get_escape_attempts(&self) -> EscapeAttempts {
        self.state.escape.attempts()
    }

    /// Returns [`VALIDATED`] if `signature` satisfies the full policy for `hash`, zero otherwise.
    #[must_use]
    pub fn is_valid_signature(&self, hash: Felt, signature: &[Felt]) -> Felt {
        let valid = parse_signatures(signature)
            .is_ok_and(|signatures| is_valid_signature_set(&self.state, hash, &signatures));
        if valid {
            VALIDATED
        } else {
            U256::ZERO
        }
    }

    /// Whether `nonce` is still unused.
    #[must_use]
    pub fn is_valid_outside_execution_nonce(&self, nonce: &Felt) -> bool {
        self.state.outside_nonces.is_valid(nonce)
    }

    /// Message the signers must sign to authorize `outside` on this account.
    #[must_use]
    pub fn outside_execution_message_hash(&self, outside: &OutsideExecution) -> Felt {
        outside.message_hash(self.config.chain_id, self.address)
    }
}
