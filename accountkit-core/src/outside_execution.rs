//! Outside execution: call bundles signed off-chain and submitted by a third party.
//!
//! The signed message is a domain-separated hash over the bundle, bound to the
//! chain and the account. Every entry re-checks caller, time window and nonce,
//! so nested outside executions inherit no trust from the frame around them.

use std::collections::HashSet;

use alloy_primitives::{address, Address, U256};
use serde::{Deserialize, Serialize};

use crate::codec::{Decode, Encode, WordReader};
use crate::error::{AccountError, AccountResult};
use crate::primitives::{address_to_felt, hash_on_elements, selector, short_string, Call, Felt};

/// Wildcard caller: any submitter may execute the bundle. Encodes `ANY_CALLER`.
pub const ANY_CALLER: Address = address!("0x00000000000000000000414e595f43414c4c4552");

const DOMAIN_NAME: &str = "Account.execute_from_outside";
const DOMAIN_VERSION: u64 = 1;
const MESSAGE_PREFIX: &str = "StarkNet Message";

fn domain_type_hash() -> Felt {
    selector("StarkNetDomain(name:felt,version:felt,chainId:felt)")
}

fn call_type_hash() -> Felt {
    selector("OutsideCall(to:felt,selector:felt,calldata_len:felt,calldata:felt*)")
}

fn outside_execution_type_hash() -> Felt {
    selector(
        "OutsideExecution(caller:felt,nonce:felt,execute_after:felt,execute_before:felt,calls_len:felt,calls:OutsideCall*)OutsideCall(to:felt,selector:felt,calldata_len:felt,calldata:felt*)",
    )
}

/// Hash of the signing domain for `chain_id`.
#[must_use]
pub fn domain_hash(chain_id: Felt) -> Felt {
    hash_on_elements(&[
        domain_type_hash(),
        short_string(DOMAIN_NAME),
        U256::from(DOMAIN_VERSION),
        chain_id,
    ])
}

/// Hash of one call in a bundle.
#[must_use]
pub fn call_hash(call: &Call) -> Felt {
    hash_on_elements(&[
        call_type_hash(),
        address_to_felt(call.to),
        call.selector,
        hash_on_elements(&call.calldata),
    ])
}

/// A pre-authorized call bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutsideExecution {
    /// Only this address may submit, unless it is [`ANY_CALLER`].
    pub caller: Address,
    /// Single-use nonce, any value.
    pub nonce: Felt,
    /// Executable from this timestamp on.
    pub execute_after: u64,
    /// Executable strictly before this timestamp.
    pub execute_before: u64,
    /// Calls to run.
    pub calls: Vec<Call>,
}

impl OutsideExecution {
    /// Hash of the bundle fields.
    #[must_use]
    pub fn bundle_hash(&self) -> Felt {
        let call_hashes: Vec<Felt> = self.calls.iter().map(call_hash).collect();
        hash_on_elements(&[
            outside_execution_type_hash(),
            address_to_felt(self.caller),
            self.nonce,
            U256::from(self.execute_after),
            U256::from(self.execute_before),
            U256::from(self.calls.len()),
            hash_on_elements(&call_hashes),
        ])
    }

    /// Message the account's signers sign to authorize this bundle.
    #[must_use]
    pub fn message_hash(&self, chain_id: Felt, account: Address) -> Felt {
        hash_on_elements(&[
            short_string(MESSAGE_PREFIX),
            domain_hash(chain_id),
            address_to_felt(account),
            self.bundle_hash(),
        ])
    }

    /// Checks the submitter and the time window at `now`.
    ///
    /// The window is inclusive of `execute_after`, exclusive of `execute_before`.
    ///
    /// # Errors
    /// - [`AccountError::InvalidCaller`] if the bundle is scoped to another submitter.
    /// - [`AccountError::OutsideExecutionTooEarly`] before the window opens.
    /// - [`AccountError::OutsideExecutionExpired`] once it closed.
    pub fn assert_executable(&self, submitter: Address, now: u64) -> AccountResult<()> {
        if self.caller != ANY_CALLER && self.caller != submitter {
            return Err(AccountError::InvalidCaller);
        }
        if now < self.execute_after {
            return Err(AccountError::OutsideExecutionTooEarly);
        }
        if now >= self.execute_before {
            return Err(AccountError::OutsideExecutionExpired);
        }
        Ok(())
    }
}

impl Encode for OutsideExecution {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.caller.encode(out);
        self.nonce.encode(out);
        self.execute_after.encode(out);
        self.execute_before.encode(out);
        self.calls.encode(out);
    }
}

impl Decode for OutsideExecution {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        Ok(Self {
            caller: Address::decode(reader)?,
            nonce: Felt::decode(reader)?,
            execute_after: u64::decode(reader)?,
            execute_before: u64::decode(reader)?,
            calls: Vec::decode(reader)?,
        })
    }
}

/// Outside execution nonces consumed by an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceSet {
    used: HashSet<Felt>,
}

impl NonceSet {
    /// Whether `nonce` can still be used.
    #[must_use]
    pub fn is_valid(&self, nonce: &Felt) -> bool {
        !self.used.contains(nonce)
    }

    /// Marks `nonce` used.
    ///
    /// # Errors
    /// [`AccountError::DuplicatedOutsideNonce`] if it already was.
    pub fn consume(&mut self, nonce: Felt) -> AccountResult<()> {
        if self.used.insert(nonce) {
            Ok(())
        } else {
            Err(AccountError::DuplicatedOutsideNonce)
        }
    }
}
