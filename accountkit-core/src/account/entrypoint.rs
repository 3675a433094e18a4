use alloy_primitives::Address;
use strum::{Display, EnumIter, IntoEnumIterator};

use super::{Host, SmartAccount};
use crate::codec::{decode_all, Encode};
use crate::error::{AccountError, AccountResult};
use crate::escape::EscapeRole;
use crate::outside_execution::OutsideExecution;
use crate::primitives::{selector, Call, Felt};
use crate::signer::{Signer, SignerSignature};

/// Entry points reachable through a call to the account itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Entrypoint {
    /// `change_owner(signer_signature)`.
    ChangeOwner,
    /// `change_guardian(Option<Signer>)`.
    ChangeGuardian,
    /// `change_guardian_backup(Option<Signer>)`.
    ChangeGuardianBackup,
    /// `trigger_escape_owner(Signer)`, guardian-signed.
    TriggerEscapeOwner,
    /// `trigger_escape_guardian(Option<Signer>)`, owner-signed.
    TriggerEscapeGuardian,
    /// `escape_owner()`, guardian-signed.
    EscapeOwner,
    /// `escape_guardian()`, owner-signed.
    EscapeGuardian,
    /// `cancel_escape()`.
    CancelEscape,
    /// `execute_from_outside(OutsideExecution, signature)`.
    ExecuteFromOutside,
}

impl Entrypoint {
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

    /// Role that alone authorizes this entry point when it is the only call.
    #[must_use]
    pub const fn escape_role(self) -> Option<EscapeRole> {
        match self {
            Self::TriggerEscapeOwner | Self::EscapeOwner => Some(EscapeRole::Guardian),
            Self::TriggerEscapeGuardian | Self::EscapeGuardian => Some(EscapeRole::Owner),
            _ => None,
        }
    }

    /// Checks the calldata shape of an escape entry point.
    pub(super) fn check_escape_calldata(self, calldata: &[Felt]) -> AccountResult<()> {
        match self {
            Self::TriggerEscapeOwner => decode_all::<Signer>(calldata).map(drop),
            Self::TriggerEscapeGuardian => decode_all::<Option<Signer>>(calldata).map(drop),
            _ => decode_all::<()>(calldata),
        }
    }
}

impl SmartAccount {
    /// Routes a call the account makes to itself.
    pub(super) fn dispatch_self_call(
        &mut self,
        host: &mut dyn Host,
        call: &Call,
    ) -> AccountResult<Vec<Felt>> {
        let entrypoint =
            Entrypoint::from_selector(call.selector).ok_or(AccountError::EntrypointNotFound)?;
        let caller: Address = self.address;
        log::debug!("{} self-call {entrypoint}", self.address);

        match entrypoint {
            Entrypoint::ChangeOwner => {
                let signature: SignerSignature = decode_all(&call.calldata)?;
                self.change_owner(&*host, caller, &signature)?;
            }
            Entrypoint::ChangeGuardian => {
                let guardian: Option<Signer> = decode_all(&call.calldata)?;
                self.change_guardian(&*host, caller, guardian.as_ref())?;
            }
            Entrypoint::ChangeGuardianBackup => {
                let backup: Option<Signer> = decode_all(&call.calldata)?;
                self.change_guardian_backup(&*host, caller, backup.as_ref())?;
            }
            Entrypoint::TriggerEscapeOwner => {
                let new_owner: Signer = decode_all(&call.calldata)?;
                self.trigger_escape_owner(&*host, caller, &new_owner)?;
            }
            Entrypoint::TriggerEscapeGuardian => {
                let new_guardian: Option<Signer> = decode_all(&call.calldata)?;
                self.trigger_escape_guardian(&*host, caller, new_guardian.as_ref())?;
            }
            Entrypoint::EscapeOwner => {
                decode_all::<()>(&call.calldata)?;
                self.escape_owner(&*host, caller)?;
            }
            Entrypoint::EscapeGuardian => {
                decode_all::<()>(&call.calldata)?;
                self.escape_guardian(&*host, caller)?;
            }
            Entrypoint::CancelEscape => {
                decode_all::<()>(&call.calldata)?;
                self.cancel_escape(&*host, caller)?;
            }
            Entrypoint::ExecuteFromOutside => {
                let (outside, signature): (OutsideExecution, Vec<Felt>) =
                    decode_all(&call.calldata)?;
                let response = self.execute_from_outside(host, caller, &outside, &signature)?;
                return Ok(response.to_words());
            }
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    #[test]
    fn test_selector_lookup() {
        for entrypoint in Entrypoint::iter() {
            assert_eq!(Entrypoint::from_selector(entrypoint.selector()), Some(entrypoint));
        }
        assert_eq!(Entrypoint::EscapeOwner.selector(), selector("escape_owner"));
        assert_eq!(Entrypoint::from_selector(selector("upgrade")), None);
    }

    #[test]
    fn test_escape_roles() {
        assert_eq!(
            Entrypoint::TriggerEscapeOwner.escape_role(),
            Some(EscapeRole::Guardian)
        );
        assert_eq!(
            Entrypoint::EscapeGuardian.escape_role(),
            Some(EscapeRole::Owner)
        );
        assert_eq!(Entrypoint::CancelEscape.escape_role(), None);
    }

    #[test]
    fn test_escape_calldata_shape() {
        assert!(Entrypoint::EscapeOwner.check_escape_calldata(&[]).is_ok());
        assert!(Entrypoint::EscapeOwner
            .check_escape_calldata(&[U256::from(1)])
            .is_err());
        assert!(Entrypoint::TriggerEscapeGuardian
            .check_escape_calldata(&[U256::ZERO])
            .is_ok());
        assert!(Entrypoint::TriggerEscapeOwner
            .check_escape_calldata(&[])
            .is_err());
    }
}
