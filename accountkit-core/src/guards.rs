//! Invocation-context assertions shared by every entry point.

use alloy_primitives::{Address, U256};

use crate::error::{AccountError, AccountResult};
use crate::primitives::{Call, Felt};

/// Current transaction version.
pub const TX_V3: Felt = U256::from_limbs([3, 0, 0, 0]);

/// Offset added to a version for simulation (query) transactions: `2^128`.
pub const QUERY_OFFSET: Felt = U256::from_limbs([0, 0, 1, 0]);

/// Who is calling, on behalf of which account, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Address of the immediate caller. Zero for the protocol.
    pub caller: Address,
    /// Address of the account being called.
    pub account: Address,
    /// Block timestamp.
    pub now: u64,
}

impl CallContext {
    /// Fails unless the account is calling itself.
    ///
    /// # Errors
    /// [`AccountError::OnlySelf`].
    pub fn assert_only_self(&self) -> AccountResult<()> {
        assert_only_self(self.caller, self.account)
    }
}

/// Fails unless `caller` is the account itself.
///
/// # Errors
/// [`AccountError::OnlySelf`].
pub fn assert_only_self(caller: Address, account: Address) -> AccountResult<()> {
    if caller == account {
        Ok(())
    } else {
        Err(AccountError::OnlySelf)
    }
}

/// Fails unless `caller` is the protocol's zero address.
///
/// # Errors
/// [`AccountError::NonNullCaller`].
pub fn assert_only_protocol(caller: Address) -> AccountResult<()> {
    if caller.is_zero() {
        Ok(())
    } else {
        Err(AccountError::NonNullCaller)
    }
}

/// Fails if any call in a multicall targets the account.
///
/// # Errors
/// [`AccountError::NoMulticallToSelf`].
pub fn assert_no_self_call(calls: &[Call], account: Address) -> AccountResult<()> {
    if calls.iter().any(|call| call.to == account) {
        Err(AccountError::NoMulticallToSelf)
    } else {
        Ok(())
    }
}

/// Accepts [`TX_V3`] and its query counterpart only.
///
/// # Errors
/// [`AccountError::InvalidTxVersion`].
pub fn assert_correct_tx_version(version: Felt) -> AccountResult<()> {
    if version == TX_V3 || version == TX_V3 + QUERY_OFFSET {
        Ok(())
    } else {
        Err(AccountError::InvalidTxVersion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const ACCOUNT: Address = address!("0x00000000000000000000000000000000000000a1");

    #[test]
    fn test_only_self() {
        assert!(assert_only_self(ACCOUNT, ACCOUNT).is_ok());
        assert_eq!(
            assert_only_self(Address::ZERO, ACCOUNT),
            Err(AccountError::OnlySelf)
        );
    }

    #[test]
    fn test_only_protocol() {
        assert!(assert_only_protocol(Address::ZERO).is_ok());
        assert_eq!(
            assert_only_protocol(ACCOUNT),
            Err(AccountError::NonNullCaller)
        );
    }

    #[test]
    fn test_no_self_call() {
        let other = address!("0x00000000000000000000000000000000000000b2");
        let calls = vec![
            Call::new(other, U256::from(1), vec![]),
            Call::new(ACCOUNT, U256::from(2), vec![]),
        ];
        assert_eq!(
            assert_no_self_call(&calls, ACCOUNT),
            Err(AccountError::NoMulticallToSelf)
        );
        assert!(assert_no_self_call(&calls[..1], ACCOUNT).is_ok());
    }

    #[test]
    fn test_tx_version() {
        assert!(assert_correct_tx_version(TX_V3).is_ok());
        assert!(assert_correct_tx_version(TX_V3 + QUERY_OFFSET).is_ok());
        assert_eq!(
            assert_correct_tx_version(U256::from(1)),
            Err(AccountError::InvalidTxVersion)
        );
        assert_eq!(QUERY_OFFSET, U256::from(1) << 128);
    }
}
