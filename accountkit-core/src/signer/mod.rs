//! Signer kinds, their identities (GUIDs) and signature verification.
//!
//! A [`Signer`] carries public key material for one of the supported schemes.
//! Storage only ever keeps its [`Guid`], computed by [`Signer::guid`], so the
//! account state does not depend on how key bytes decode for a given kind.

use alloy_primitives::{eip191_hash_message, uint, Address, Signature as EcdsaSignature, U256};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::codec::{Decode, Encode, WordReader};
use crate::error::{AccountError, AccountResult};
use crate::primitives::{felt_to_bytes32, hash_on_elements, short_string, Felt, Guid};

mod webauthn;

pub use webauthn::{WebauthnAssertion, WebauthnSigner};

/// Half the order of the secp256k1 group; signatures with a larger `s` are malleable.
const SECP256K1_HALF_ORDER: U256 =
    uint!(0x7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0_U256);

/// Signature schemes an account can be controlled by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize,
)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SignerType {
    /// Native Ed25519 key.
    Ed25519,
    /// Secp256k1 key identified by its Ethereum address, signing the raw hash.
    Secp256k1,
    /// Secp256r1 (P-256) key.
    Secp256r1,
    /// Ethereum personal-sign (EIP-191) over the hash.
    Eip191,
    /// WebAuthn (passkey) credential backed by a P-256 key.
    Webauthn,
}

impl SignerType {
    /// Word written in front of the key material when hashing the GUID.
    #[must_use]
    pub fn magic(self) -> Felt {
        match self {
            Self::Ed25519 => short_string("Ed25519 Signer"),
            Self::Secp256k1 => short_string("Secp256k1 Signer"),
            Self::Secp256r1 => short_string("Secp256r1 Signer"),
            Self::Eip191 => short_string("Eip191 Signer"),
            Self::Webauthn => short_string("Webauthn Signer"),
        }
    }

    const fn index(self) -> u8 {
        self as u8
    }

    fn from_index(index: u8) -> AccountResult<Self> {
        Self::iter()
            .find(|kind| kind.index() == index)
            .ok_or_else(|| AccountError::calldata(format!("unknown signer type {index}")))
    }
}

/// Uncompressed P-256 public key coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct P256PublicKey {
    /// Affine x coordinate.
    pub x: Felt,
    /// Affine y coordinate.
    pub y: Felt,
}

impl P256PublicKey {
    /// Builds the key from SEC1 bytes (compressed or uncompressed).
    ///
    /// # Errors
    /// Returns [`AccountError::InvalidSigner`] if the bytes are not a point on the curve.
    pub fn from_sec1_bytes(bytes: &[u8]) -> AccountResult<Self> {
        let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|_| AccountError::InvalidSigner)?;
        let point = key.to_encoded_point(false);
        let (Some(x), Some(y)) = (point.x(), point.y()) else {
            return Err(AccountError::InvalidSigner);
        };
        Ok(Self {
            x: U256::from_be_slice(x),
            y: U256::from_be_slice(y),
        })
    }

    fn verifying_key(&self) -> Option<p256::ecdsa::VerifyingKey> {
        let mut sec1 = [0u8; 65];
        sec1[0] = 0x04;
        sec1[1..33].copy_from_slice(&self.x.to_be_bytes::<32>());
        sec1[33..].copy_from_slice(&self.y.to_be_bytes::<32>());
        p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1).ok()
    }

    /// Verifies an ECDSA `(r, s)` signature over a 32-byte prehash.
    pub(crate) fn verify_prehash(&self, prehash: &[u8], r: Felt, s: Felt) -> bool {
        let Some(key) = self.verifying_key() else {
            return false;
        };
        let mut raw = [0u8; 64];
        raw[..32].copy_from_slice(&r.to_be_bytes::<32>());
        raw[32..].copy_from_slice(&s.to_be_bytes::<32>());
        let Ok(signature) = p256::ecdsa::Signature::from_slice(&raw) else {
            return false;
        };
        key.verify_prehash(prehash, &signature).is_ok()
    }
}

/// Public key material for one signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signer {
    /// Ed25519 public key bytes.
    Ed25519 {
        /// Compressed Edwards point.
        pubkey: Felt,
    },
    /// Secp256k1 key, stored as the Ethereum address derived from it.
    Secp256k1 {
        /// Address of the key.
        pubkey_hash: Address,
    },
    /// Secp256r1 key.
    Secp256r1 {
        /// Public key coordinates.
        pubkey: P256PublicKey,
    },
    /// Ethereum account signing with `personal_sign`.
    Eip191 {
        /// Address of the signing account.
        eth_address: Address,
    },
    /// WebAuthn credential.
    Webauthn(WebauthnSigner),
}

impl Signer {
    /// The scheme of this signer.
    #[must_use]
    pub const fn signer_type(&self) -> SignerType {
        match self {
            Self::Ed25519 { .. } => SignerType::Ed25519,
            Self::Secp256k1 { .. } => SignerType::Secp256k1,
            Self::Secp256r1 { .. } => SignerType::Secp256r1,
            Self::Eip191 { .. } => SignerType::Eip191,
            Self::Webauthn(_) => SignerType::Webauthn,
        }
    }

    /// Key material as words, in the order hashed into the GUID.
    fn key_words(&self) -> Vec<Felt> {
        match self {
            Self::Ed25519 { pubkey } => vec![*pubkey],
            Self::Secp256k1 { pubkey_hash } => pubkey_hash.to_words(),
            Self::Secp256r1 { pubkey } => vec![pubkey.x, pubkey.y],
            Self::Eip191 { eth_address } => eth_address.to_words(),
            Self::Webauthn(signer) => signer.key_words(),
        }
    }

    /// Computes the signer GUID: `hash_on_elements([magic, key words...])`.
    #[must_use]
    pub fn guid(&self) -> Guid {
        let mut elements = vec![self.signer_type().magic()];
        elements.extend(self.key_words());
        hash_on_elements(&elements)
    }

    /// Rejects key material that can never verify a signature.
    ///
    /// # Errors
    /// Returns [`AccountError::InvalidSigner`] for zero keys and off-curve points.
    pub fn validate(&self) -> AccountResult<()> {
        let valid = match self {
            Self::Ed25519 { pubkey } => ed25519_key(*pubkey).is_some(),
            Self::Secp256k1 { pubkey_hash } => !pubkey_hash.is_zero(),
            Self::Eip191 { eth_address } => !eth_address.is_zero(),
            Self::Secp256r1 { pubkey } => pubkey.verifying_key().is_some(),
            Self::Webauthn(signer) => signer.is_well_formed(),
        };
        if valid {
            Ok(())
        } else {
            Err(AccountError::InvalidSigner)
        }
    }
}

fn ed25519_key(pubkey: Felt) -> Option<ed25519_dalek::VerifyingKey> {
    if pubkey.is_zero() {
        return None;
    }
    ed25519_dalek::VerifyingKey::from_bytes(&pubkey.to_be_bytes::<32>()).ok()
}

/// ECDSA scalars plus the recovery bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcdsaScalars {
    /// `r` scalar.
    pub r: Felt,
    /// `s` scalar.
    pub s: Felt,
    /// Parity of the `R` point's y coordinate.
    pub y_parity: bool,
}

impl EcdsaScalars {
    fn recover_address(&self, prehash: &alloy_primitives::B256) -> Option<Address> {
        if self.s > SECP256K1_HALF_ORDER {
            return None;
        }
        EcdsaSignature::new(self.r, self.s, self.y_parity)
            .recover_address_from_prehash(prehash)
            .ok()
    }
}

/// A signer paired with its signature over a message hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerSignature {
    /// Ed25519 signature `(R, S)` over the 32 hash bytes.
    Ed25519 {
        /// Signing key.
        signer: Signer,
        /// Encoded `R` point.
        r: Felt,
        /// `S` scalar.
        s: Felt,
    },
    /// Secp256k1 signature over the raw hash.
    Secp256k1 {
        /// Signing key.
        signer: Signer,
        /// Signature scalars.
        signature: EcdsaScalars,
    },
    /// P-256 signature over the raw hash.
    Secp256r1 {
        /// Signing key.
        signer: Signer,
        /// `r` scalar.
        r: Felt,
        /// `s` scalar.
        s: Felt,
    },
    /// `personal_sign` signature over the hash bytes.
    Eip191 {
        /// Signing account.
        signer: Signer,
        /// Signature scalars.
        signature: EcdsaScalars,
    },
    /// WebAuthn assertion whose challenge is the hash.
    Webauthn {
        /// Credential.
        signer: Signer,
        /// Assertion data.
        assertion: WebauthnAssertion,
    },
}

impl SignerSignature {
    /// The signer this signature claims to come from.
    #[must_use]
    pub const fn signer(&self) -> &Signer {
        match self {
            Self::Ed25519 { signer, .. }
            | Self::Secp256k1 { signer, .. }
            | Self::Secp256r1 { signer, .. }
            | Self::Eip191 { signer, .. }
            | Self::Webauthn { signer, .. } => signer,
        }
    }

    /// GUID of the claimed signer.
    #[must_use]
    pub fn signer_guid(&self) -> Guid {
        self.signer().guid()
    }

    /// Checks the signature over `hash` against the claimed signer.
    #[must_use]
    pub fn is_valid_signature(&self, hash: Felt) -> bool {
        let hash_bytes = felt_to_bytes32(hash);
        match self {
            Self::Ed25519 {
                signer: Signer::Ed25519 { pubkey },
                r,
                s,
            } => {
                let Some(key) = ed25519_key(*pubkey) else {
                    return false;
                };
                let mut raw = [0u8; 64];
                raw[..32].copy_from_slice(&r.to_be_bytes::<32>());
                raw[32..].copy_from_slice(&s.to_be_bytes::<32>());
                let signature = ed25519_dalek::Signature::from_bytes(&raw);
                key.verify_strict(hash_bytes.as_slice(), &signature).is_ok()
            }
            Self::Secp256k1 {
                signer: Signer::Secp256k1 { pubkey_hash },
                signature,
            } => signature.recover_address(&hash_bytes) == Some(*pubkey_hash),
            Self::Eip191 {
                signer: Signer::Eip191 { eth_address },
                signature,
            } => {
                let prehash = eip191_hash_message(hash_bytes.as_slice());
                signature.recover_address(&prehash) == Some(*eth_address)
            }
            Self::Secp256r1 {
                signer: Signer::Secp256r1 { pubkey },
                r,
                s,
            } => pubkey.verify_prehash(hash_bytes.as_slice(), *r, *s),
            Self::Webauthn {
                signer: Signer::Webauthn(signer),
                assertion,
            } => assertion.verify(signer, hash),
            _ => false,
        }
    }
}

impl Encode for P256PublicKey {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(self.x);
        out.push(self.y);
    }
}

impl Decode for P256PublicKey {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        Ok(Self {
            x: reader.next_word()?,
            y: reader.next_word()?,
        })
    }
}

impl Encode for Signer {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.signer_type().index().encode(out);
        match self {
            Self::Ed25519 { pubkey } => pubkey.encode(out),
            Self::Secp256k1 { pubkey_hash } => pubkey_hash.encode(out),
            Self::Secp256r1 { pubkey } => pubkey.encode(out),
            Self::Eip191 { eth_address } => eth_address.encode(out),
            Self::Webauthn(signer) => signer.encode(out),
        }
    }
}

impl Decode for Signer {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        let signer = match SignerType::from_index(u8::decode(reader)?)? {
            SignerType::Ed25519 => Self::Ed25519 {
                pubkey: reader.next_word()?,
            },
            SignerType::Secp256k1 => Self::Secp256k1 {
                pubkey_hash: Address::decode(reader)?,
            },
            SignerType::Secp256r1 => Self::Secp256r1 {
                pubkey: P256PublicKey::decode(reader)?,
            },
            SignerType::Eip191 => Self::Eip191 {
                eth_address: Address::decode(reader)?,
            },
            SignerType::Webauthn => Self::Webauthn(WebauthnSigner::decode(reader)?),
        };
        Ok(signer)
    }
}

impl Encode for EcdsaScalars {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.r.encode(out);
        self.s.encode(out);
        self.y_parity.encode(out);
    }
}

impl Decode for EcdsaScalars {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        Ok(Self {
            r: reader.next_word()?,
            s: reader.next_word()?,
            y_parity: bool::decode(reader)?,
        })
    }
}

impl Encode for SignerSignature {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.signer().encode(out);
        match self {
            Self::Ed25519 { r, s, .. } | Self::Secp256r1 { r, s, .. } => {
                r.encode(out);
                s.encode(out);
            }
            Self::Secp256k1 { signature, .. } | Self::Eip191 { signature, .. } => {
                signature.encode(out);
            }
            Self::Webauthn { assertion, .. } => assertion.encode(out),
        }
    }
}

impl Decode for SignerSignature {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        let signer = Signer::decode(reader)?;
        let signature = match signer.signer_type() {
            SignerType::Ed25519 => Self::Ed25519 {
                signer,
                r: reader.next_word()?,
                s: reader.next_word()?,
            },
            SignerType::Secp256k1 => Self::Secp256k1 {
                signer,
                signature: EcdsaScalars::decode(reader)?,
            },
            SignerType::Secp256r1 => Self::Secp256r1 {
                signer,
                r: reader.next_word()?,
                s: reader.next_word()?,
            },
            SignerType::Eip191 => Self::Eip191 {
                signer,
                signature: EcdsaScalars::decode(reader)?,
            },
            SignerType::Webauthn => Self::Webauthn {
                signer,
                assertion: WebauthnAssertion::decode(reader)?,
            },
        };
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_all;
    use alloy_primitives::address;

    fn ed25519_signer() -> Signer {
        let key = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]);
        Signer::Ed25519 {
            pubkey: U256::from_be_bytes(key.verifying_key().to_bytes()),
        }
    }

    #[test]
    fn test_guid_depends_on_kind() {
        let eth = address!("0x00000000000000000000000000000000000000aa");
        let k1 = Signer::Secp256k1 { pubkey_hash: eth };
        let eip191 = Signer::Eip191 { eth_address: eth };
        assert_eq!(k1.key_words(), eip191.key_words());
        assert_ne!(k1.guid(), eip191.guid());
    }

    #[test]
    fn test_signer_decoding_restores_guid() {
        let signer = ed25519_signer();
        let decoded: Signer = decode_all(&signer.to_words()).unwrap();
        assert_eq!(decoded.guid(), signer.guid());
    }

    #[test]
    fn test_ed25519_signature() {
        use ed25519_dalek::Signer as _;

        let key = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]);
        let hash = U256::from(0xc0ffee_u64);
        let raw = key.sign(&hash.to_be_bytes::<32>()).to_bytes();
        let signature = SignerSignature::Ed25519 {
            signer: ed25519_signer(),
            r: U256::from_be_slice(&raw[..32]),
            s: U256::from_be_slice(&raw[32..]),
        };
        assert!(signature.is_valid_signature(hash));
        assert!(!signature.is_valid_signature(hash + U256::from(1)));
    }

    #[test]
    fn test_mismatched_signer_kind_is_invalid() {
        let signature = SignerSignature::Secp256r1 {
            signer: ed25519_signer(),
            r: U256::from(1),
            s: U256::from(1),
        };
        assert!(!signature.is_valid_signature(U256::from(1)));
    }

    #[test]
    fn test_rejects_zero_keys() {
        assert_eq!(
            Signer::Ed25519 { pubkey: U256::ZERO }.validate(),
            Err(AccountError::InvalidSigner)
        );
        assert_eq!(
            Signer::Eip191 {
                eth_address: Address::ZERO
            }
            .validate(),
            Err(AccountError::InvalidSigner)
        );
        assert!(ed25519_signer().validate().is_ok());
    }

    #[test]
    fn test_unknown_signer_type() {
        let err = decode_all::<Signer>(&[U256::from(9), U256::from(1)]).unwrap_err();
        assert!(matches!(err, AccountError::InvalidCalldata(_)));
    }
}
