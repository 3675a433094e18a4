//! Versioned CBOR envelopes for persisted account state.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{AccountError, AccountResult};

const STATE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StateEnvelope<T> {
    version: u32,
    state: T,
}

pub(crate) fn serialize<T: Serialize>(state: &T) -> AccountResult<Vec<u8>> {
    let envelope = StateEnvelope {
        version: STATE_VERSION,
        state,
    };
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&envelope, &mut bytes)
        .map_err(|err| AccountError::SerializationError(err.to_string()))?;
    Ok(bytes)
}

pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> AccountResult<T> {
    let envelope: StateEnvelope<T> = ciborium::de::from_reader(bytes)
        .map_err(|err| AccountError::SerializationError(err.to_string()))?;
    if envelope.version != STATE_VERSION {
        return Err(AccountError::UnsupportedStateVersion(envelope.version));
    }
    Ok(envelope.state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{P256PublicKey, Signer, WebauthnSigner};
    use alloy_primitives::{Address, B256, U256};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        value: u64,
    }

    #[test]
    fn test_signers_of_every_kind_round_trip() {
        let pubkey = P256PublicKey {
            x: U256::from(3),
            y: U256::from(4),
        };
        let signers = vec![
            Signer::Ed25519 {
                pubkey: U256::from(1),
            },
            Signer::Secp256k1 {
                pubkey_hash: Address::repeat_byte(0x11),
            },
            Signer::Secp256r1 { pubkey },
            Signer::Eip191 {
                eth_address: Address::repeat_byte(0x22),
            },
            Signer::Webauthn(WebauthnSigner {
                origin: b"https://wallet.example".to_vec(),
                rp_id_hash: B256::repeat_byte(0x33),
                pubkey,
            }),
        ];
        let bytes = serialize(&signers).unwrap();
        assert_eq!(deserialize::<Vec<Signer>>(&bytes).unwrap(), signers);
    }

    #[test]
    fn test_version_mismatch() {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(
            &StateEnvelope {
                version: STATE_VERSION + 1,
                state: Sample { value: 1 },
            },
            &mut bytes,
        )
        .unwrap();
        assert_eq!(
            deserialize::<Sample>(&bytes),
            Err(AccountError::UnsupportedStateVersion(STATE_VERSION + 1))
        );
    }

    #[test]
    fn test_garbage_input() {
        let err = deserialize::<Sample>(&[0xff, 0x00]).unwrap_err();
        assert!(matches!(err, AccountError::SerializationError(_)));
    }
}
