//! Word-level primitives shared by every component: felts, calls, selectors and hashing.
//!
//! All protocol hashes are built from [`hash_on_elements`], a left fold over
//! `keccak256(acc || element)` that appends the element count as the last step.
//! Appending the count after folding makes `[]` and `[0]` (and any prefix of a
//! longer sequence) hash differently.

use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::{AccountError, AccountResult};

/// A 256-bit word. Calldata, selectors, nonces and signature payloads are felt sequences.
pub type Felt = U256;

/// Identity of a signer: a hash over its kind and public key material.
pub type Guid = Felt;

/// Marker returned by validation entry points when a signature is accepted.
///
/// Encodes the ASCII string `VALID`.
pub const VALIDATED: Felt = U256::from_limbs([0x56_414c_4944, 0, 0, 0]);

/// Mask keeping the low 250 bits of a selector hash.
const SELECTOR_MASK: U256 = U256::from_limbs([
    u64::MAX,
    u64::MAX,
    u64::MAX,
    0x03ff_ffff_ffff_ffff,
]);

/// A single contract call: target, entrypoint selector and calldata words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    /// Contract receiving the call.
    pub to: Address,
    /// Entrypoint selector, see [`selector`].
    pub selector: Felt,
    /// Encoded arguments.
    pub calldata: Vec<Felt>,
}

impl Call {
    /// Creates a call.
    #[must_use]
    pub const fn new(to: Address, selector: Felt, calldata: Vec<Felt>) -> Self {
        Self {
            to,
            selector,
            calldata,
        }
    }
}

/// Hashes two words.
#[must_use]
pub fn hash_pair(a: Felt, b: Felt) -> Felt {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(&a.to_be_bytes::<32>());
    buf[32..].copy_from_slice(&b.to_be_bytes::<32>());
    U256::from_be_bytes(keccak256(buf).0)
}

/// Folds `elements` left to right and appends their count.
#[must_use]
pub fn hash_on_elements(elements: &[Felt]) -> Felt {
    let folded = elements
        .iter()
        .fold(U256::ZERO, |acc, element| hash_pair(acc, *element));
    hash_pair(folded, U256::from(elements.len()))
}

/// Computes the entrypoint selector for `name`: `keccak256(name)` truncated to 250 bits.
#[must_use]
pub fn selector(name: &str) -> Felt {
    U256::from_be_bytes(keccak256(name.as_bytes()).0) & SELECTOR_MASK
}

/// Encodes an ASCII string of at most 31 bytes as a big-endian word.
///
/// Longer inputs are truncated to their first 31 bytes.
#[must_use]
pub fn short_string(value: &str) -> Felt {
    let bytes = &value.as_bytes()[..value.len().min(31)];
    U256::from_be_slice(bytes)
}

/// Converts an address into a word.
#[must_use]
pub fn address_to_felt(address: Address) -> Felt {
    U256::from_be_slice(address.as_slice())
}

/// Converts a word back into an address.
///
/// # Errors
/// Returns [`AccountError::InvalidCalldata`] if the word does not fit in 160 bits.
pub fn felt_to_address(value: Felt) -> AccountResult<Address> {
    if value.bit_len() > 160 {
        return Err(AccountError::calldata("address out of range"));
    }
    Ok(Address::from_word(B256::from(value.to_be_bytes::<32>())))
}

/// Converts a 32-byte value into a word.
#[must_use]
pub fn bytes32_to_felt(value: B256) -> Felt {
    U256::from_be_bytes(value.0)
}

/// Converts a word into 32 big-endian bytes.
#[must_use]
pub fn felt_to_bytes32(value: Felt) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}
