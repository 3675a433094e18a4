//! `AccountKit` is the authorization and key-recovery core for guardian-protected smart accounts.
//!
//! This crate re-exports [`accountkit_core`]; see its documentation for the account, escape,
//! recovery and outside-execution APIs.

pub use accountkit_core::*;
