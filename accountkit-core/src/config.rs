use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{AccountError, AccountResult};
use crate::primitives::{short_string, Felt};

/// Default escape security period: 7 days.
pub const DEFAULT_ESCAPE_SECURITY_PERIOD: u64 = 7 * 24 * 60 * 60;

/// Default window during which a ready escape can be completed: 7 days.
pub const DEFAULT_ESCAPE_EXPIRY_PERIOD: u64 = 7 * 24 * 60 * 60;

/// Throttled escape calls allowed per role between resets.
pub const DEFAULT_MAX_ESCAPE_ATTEMPTS: u32 = 5;

/// Highest max fee a throttled escape transaction may declare.
pub const DEFAULT_MAX_ESCAPE_MAX_FEE: u128 = 50_000_000_000_000_000;

/// The network an account is deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    Mainnet,
    /// Public test network.
    Sepolia,
    /// Local development network.
    Devnet,
}

impl Network {
    /// Chain identifier mixed into signed messages.
    #[must_use]
    pub fn chain_id(self) -> Felt {
        match self {
            Self::Mainnet => short_string("SN_MAIN"),
            Self::Sepolia => short_string("SN_SEPOLIA"),
            Self::Devnet => short_string("SN_DEVNET"),
        }
    }
}

/// Per-account constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Chain identifier mixed into signed messages.
    pub chain_id: Felt,
    /// Time between triggering an escape and being able to complete it.
    pub escape_security_period: u64,
    /// Time after `ready_at` during which an escape can be completed.
    pub escape_expiry_period: u64,
    /// Throttled escape calls allowed per role between resets.
    pub max_escape_attempts: u32,
    /// Highest max fee a throttled escape transaction may declare.
    pub max_escape_max_fee: u128,
}

impl AccountConfig {
    /// Default configuration for `network`.
    #[must_use]
    pub fn from_network(network: Network) -> Self {
        Self {
            chain_id: network.chain_id(),
            escape_security_period: DEFAULT_ESCAPE_SECURITY_PERIOD,
            escape_expiry_period: DEFAULT_ESCAPE_EXPIRY_PERIOD,
            max_escape_attempts: DEFAULT_MAX_ESCAPE_ATTEMPTS,
            max_escape_max_fee: DEFAULT_MAX_ESCAPE_MAX_FEE,
        }
    }

    /// Parses a JSON configuration. Missing fields take their mainnet defaults.
    ///
    /// # Errors
    /// [`AccountError::SerializationError`] if the JSON does not describe a configuration.
    pub fn from_json(json: &str) -> AccountResult<Self> {
        serde_json::from_str(json).map_err(|e| AccountError::SerializationError(e.to_string()))
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self::from_network(Network::Mainnet)
    }
}

/// Recovery settings for the external recovery component.
///
/// Either fully enabled with non-zero periods or fully zeroed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RecoveryConfig {
    /// Whether recovery can be triggered.
    pub is_enabled: bool,
    /// Time between triggering and executing a recovery.
    pub security_period: u64,
    /// Time after `ready_at` during which the recovery can be executed.
    pub expiry_period: u64,
}
