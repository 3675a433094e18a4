//! WebAuthn (passkey) assertions.
//!
//! The credential is a P-256 key bound to an origin and a relying party. An
//! assertion is valid for a hash when:
//! - `clientDataJSON` rebuilt with `challenge = base64url(hash)` and the
//!   signer's origin (plus an optional outro) hashes to the signed value,
//! - the authenticator flags carry both user-presence and user-verification,
//! - the P-256 signature verifies over
//!   `sha256(rp_id_hash || flags || sign_count || sha256(clientDataJSON))`.

use alloy_primitives::{B256, U256};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::P256PublicKey;
use crate::codec::{Decode, Encode, WordReader};
use crate::error::AccountResult;
use crate::primitives::{bytes32_to_felt, felt_to_bytes32, Felt};

/// User presence flag.
const FLAG_UP: u8 = 0b0000_0001;
/// User verification flag.
const FLAG_UV: u8 = 0b0000_0100;

/// Public part of a WebAuthn credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebauthnSigner {
    /// Origin the credential is used from, e.g. `https://wallet.example`.
    pub origin: Vec<u8>,
    /// SHA-256 of the relying party id.
    pub rp_id_hash: B256,
    /// Credential public key.
    pub pubkey: P256PublicKey,
}

impl WebauthnSigner {
    pub(super) fn key_words(&self) -> Vec<Felt> {
        let mut words = self.origin.to_words();
        words.push(bytes32_to_felt(self.rp_id_hash));
        words.push(self.pubkey.x);
        words.push(self.pubkey.y);
        words
    }

    pub(super) fn is_well_formed(&self) -> bool {
        !self.origin.is_empty()
            && std::str::from_utf8(&self.origin).is_ok()
            && self.pubkey.verifying_key().is_some()
    }
}

/// Data returned by the authenticator for one assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebauthnAssertion {
    /// Value of `crossOrigin` in the client data.
    pub cross_origin: bool,
    /// Extra client data fields after `crossOrigin`, starting with `,` and ending with `}`.
    pub client_data_json_outro: Vec<u8>,
    /// Authenticator flags.
    pub flags: u8,
    /// Authenticator signature counter.
    pub sign_count: u32,
    /// ECDSA `r`.
    pub r: Felt,
    /// ECDSA `s`.
    pub s: Felt,
}

impl WebauthnAssertion {
    /// Rebuilds the `clientDataJSON` the authenticator signed for `hash`.
    ///
    /// Returns `None` if the origin is not UTF-8 or the outro is malformed.
    #[must_use]
    pub fn client_data_json(&self, signer: &WebauthnSigner, hash: Felt) -> Option<Vec<u8>> {
        let origin = std::str::from_utf8(&signer.origin).ok()?;
        let challenge = URL_SAFE_NO_PAD.encode(felt_to_bytes32(hash));
        let mut json = format!(
            r#"{{"type":"webauthn.get","challenge":"{challenge}","origin":"{origin}","crossOrigin":{}"#,
            self.cross_origin
        )
        .into_bytes();
        if self.client_data_json_outro.is_empty() {
            json.push(b'}');
        } else {
            if self.client_data_json_outro.first() != Some(&b',')
                || self.client_data_json_outro.last() != Some(&b'}')
            {
                return None;
            }
            json.extend_from_slice(&self.client_data_json_outro);
        }
        Some(json)
    }

    /// Authenticator data: `rp_id_hash || flags || sign_count` (big-endian).
    #[must_use]
    pub fn authenticator_data(&self, signer: &WebauthnSigner) -> Vec<u8> {
        let mut data = Vec::with_capacity(37);
        data.extend_from_slice(signer.rp_id_hash.as_slice());
        data.push(self.flags);
        data.extend_from_slice(&self.sign_count.to_be_bytes());
        data
    }

    /// Digest the authenticator's P-256 key signs.
    #[must_use]
    pub fn signed_digest(&self, signer: &WebauthnSigner, hash: Felt) -> Option<[u8; 32]> {
        let client_data = self.client_data_json(signer, hash)?;
        let mut hasher = Sha256::new();
        hasher.update(self.authenticator_data(signer));
        hasher.update(Sha256::digest(&client_data));
        Some(hasher.finalize().into())
    }

    pub(super) fn verify(&self, signer: &WebauthnSigner, hash: Felt) -> bool {
        if self.flags & (FLAG_UP | FLAG_UV) != FLAG_UP | FLAG_UV {
            return false;
        }
        let Some(digest) = self.signed_digest(signer, hash) else {
            return false;
        };
        signer.pubkey.verify_prehash(&digest, self.r, self.s)
    }
}

impl Encode for WebauthnSigner {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.origin.encode(out);
        out.push(bytes32_to_felt(self.rp_id_hash));
        self.pubkey.encode(out);
    }
}

impl Decode for WebauthnSigner {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        Ok(Self {
            origin: Vec::decode(reader)?,
            rp_id_hash: felt_to_bytes32(reader.next_word()?),
            pubkey: P256PublicKey::decode(reader)?,
        })
    }
}

impl Encode for WebauthnAssertion {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.cross_origin.encode(out);
        self.client_data_json_outro.encode(out);
        out.push(U256::from(self.flags));
        out.push(U256::from(self.sign_count));
        out.push(self.r);
        out.push(self.s);
    }
}

impl Decode for WebauthnAssertion {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        Ok(Self {
            cross_origin: bool::decode(reader)?,
            client_data_json_outro: Vec::decode(reader)?,
            flags: u8::decode(reader)?,
            sign_count: u32::decode(reader)?,
            r: reader.next_word()?,
            s: reader.next_word()?,
        })
    }
}
