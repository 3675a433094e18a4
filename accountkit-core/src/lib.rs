#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Authorization and key-recovery core for guardian-protected smart accounts.
//!
//! The [`SmartAccount`] is controlled by an owner signer and an optional guardian, with
//! time-locked escapes when either key is lost. The [`MultisigAccount`] is controlled by a
//! threshold of signers and can embed guardian-driven [`recovery`].

pub mod account;
pub use account::{AccountState, Entrypoint, Host, SmartAccount, Transaction};

pub mod codec;

mod config;
pub use config::*;

mod error;
pub use error::*;

pub mod escape;
pub use escape::{Escape, EscapeAttempts, EscapeStatus, EscapeType};

mod events;
pub use events::*;

pub mod guards;

pub mod logger;

pub mod multisig;
pub use multisig::{MultisigAccount, MultisigEntrypoint, MultisigState};

pub mod outside_execution;
pub use outside_execution::{OutsideExecution, ANY_CALLER};

pub mod primitives;
pub use primitives::{Call, Felt, Guid, VALIDATED};

pub mod recovery;
pub use recovery::{EscapeCall, ExternalRecovery, RecoveryEscape, RecoveryHost};

pub mod registry;

pub mod signer;
pub use signer::{
    EcdsaScalars, P256PublicKey, Signer, SignerSignature, SignerType, WebauthnAssertion,
    WebauthnSigner,
};

pub mod validator;

// private modules
mod persistence;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!("accountkit_core");
