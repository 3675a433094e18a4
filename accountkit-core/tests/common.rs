#![allow(dead_code, missing_docs)]

//! Common test utilities shared across integration tests.

use accountkit_core::codec::Encode;
use accountkit_core::guards::TX_V3;
use accountkit_core::{
    AccountConfig, AccountResult, Call, EcdsaScalars, Entrypoint, Felt, Host, P256PublicKey,
    Signer, SignerSignature, SmartAccount, Transaction, WebauthnAssertion, WebauthnSigner,
};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy_primitives::{address, Address, B256, U256};
use ed25519_dalek::Signer as _;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use sha2::{Digest, Sha256};

pub const ACCOUNT: Address = address!("0x00000000000000000000000000000000000a11ce");
pub const RELAYER: Address = address!("0x0000000000000000000000000000000000000b0b");
pub const TOKEN: Address = address!("0x0000000000000000000000000000000000001234");

/// First block timestamp seen by tests.
pub const GENESIS: u64 = 1_700_000_000;
/// Default escape security period.
pub const WEEK: u64 = 7 * 24 * 60 * 60;

/// In-memory chain: a settable clock plus a log of outgoing calls.
pub struct MockHost {
    pub now: u64,
    pub calls: Vec<Call>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            now: GENESIS,
            calls: Vec::new(),
        }
    }

    pub fn advance(&mut self, seconds: u64) {
        self.now += seconds;
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for MockHost {
    fn block_timestamp(&self) -> u64 {
        self.now
    }

    fn call_contract(&mut self, call: &Call) -> AccountResult<Vec<Felt>> {
        self.calls.push(call.clone());
        Ok(vec![U256::from(self.calls.len())])
    }
}

/// Private key of one of the supported signer kinds.
pub enum TestKey {
    Ed25519(ed25519_dalek::SigningKey),
    Secp256k1(PrivateKeySigner),
    Secp256r1(p256::ecdsa::SigningKey),
    Eip191(PrivateKeySigner),
    Webauthn(p256::ecdsa::SigningKey),
}

impl TestKey {
    pub fn ed25519(seed: u8) -> Self {
        Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&[seed; 32]))
    }

    pub fn secp256k1(seed: u8) -> Self {
        Self::Secp256k1(PrivateKeySigner::from_bytes(&B256::repeat_byte(seed)).unwrap())
    }

    pub fn secp256r1(seed: u8) -> Self {
        Self::Secp256r1(p256::ecdsa::SigningKey::from_slice(&[seed; 32]).unwrap())
    }

    pub fn eip191(seed: u8) -> Self {
        Self::Eip191(PrivateKeySigner::from_bytes(&B256::repeat_byte(seed)).unwrap())
    }

    pub fn webauthn(seed: u8) -> Self {
        Self::Webauthn(p256::ecdsa::SigningKey::from_slice(&[seed; 32]).unwrap())
    }

    /// One key of every kind.
    pub fn all_kinds(seed: u8) -> Vec<Self> {
        vec![
            Self::ed25519(seed),
            Self::secp256k1(seed),
            Self::secp256r1(seed),
            Self::eip191(seed),
            Self::webauthn(seed),
        ]
    }

    pub fn signer(&self) -> Signer {
        match self {
            Self::Ed25519(key) => Signer::Ed25519 {
                pubkey: U256::from_be_bytes(key.verifying_key().to_bytes()),
            },
            Self::Secp256k1(key) => Signer::Secp256k1 {
                pubkey_hash: key.address(),
            },
            Self::Secp256r1(key) => Signer::Secp256r1 {
                pubkey: p256_pubkey(key),
            },
            Self::Eip191(key) => Signer::Eip191 {
                eth_address: key.address(),
            },
            Self::Webauthn(key) => Signer::Webauthn(webauthn_credential(key)),
        }
    }

    pub fn guid(&self) -> Felt {
        self.signer().guid()
    }

    pub fn sign(&self, hash: Felt) -> SignerSignature {
        let hash_bytes = B256::from(hash.to_be_bytes::<32>());
        let signer = self.signer();
        match self {
            Self::Ed25519(key) => {
                let raw = key.sign(hash_bytes.as_slice()).to_bytes();
                SignerSignature::Ed25519 {
                    signer,
                    r: U256::from_be_slice(&raw[..32]),
                    s: U256::from_be_slice(&raw[32..]),
                }
            }
            Self::Secp256k1(key) => {
                let signature = key.sign_hash_sync(&hash_bytes).unwrap();
                SignerSignature::Secp256k1 {
                    signer,
                    signature: ecdsa_scalars(&signature),
                }
            }
            Self::Eip191(key) => {
                let signature = key.sign_message_sync(hash_bytes.as_slice()).unwrap();
                SignerSignature::Eip191 {
                    signer,
                    signature: ecdsa_scalars(&signature),
                }
            }
            Self::Secp256r1(key) => {
                let (r, s) = p256_sign(key, hash_bytes.as_slice());
                SignerSignature::Secp256r1 { signer, r, s }
            }
            Self::Webauthn(key) => {
                let credential = webauthn_credential(key);
                let mut assertion = WebauthnAssertion {
                    cross_origin: false,
                    client_data_json_outro: br#","extra":"ok"}"#.to_vec(),
                    flags: 0b0000_0101,
                    sign_count: 1,
                    r: U256::ZERO,
                    s: U256::ZERO,
                };
                let digest = assertion.signed_digest(&credential, hash).unwrap();
                (assertion.r, assertion.s) = p256_sign(key, &digest);
                SignerSignature::Webauthn { signer, assertion }
            }
        }
    }
}

fn ecdsa_scalars(signature: &alloy_primitives::Signature) -> EcdsaScalars {
    EcdsaScalars {
        r: signature.r(),
        s: signature.s(),
        y_parity: signature.v(),
    }
}

fn p256_pubkey(key: &p256::ecdsa::SigningKey) -> P256PublicKey {
    let point = key.verifying_key().to_encoded_point(false);
    P256PublicKey::from_sec1_bytes(point.as_bytes()).unwrap()
}

fn p256_sign(key: &p256::ecdsa::SigningKey, prehash: &[u8]) -> (Felt, Felt) {
    let signature: p256::ecdsa::Signature = key.sign_prehash(prehash).unwrap();
    let raw = signature.to_bytes();
    (U256::from_be_slice(&raw[..32]), U256::from_be_slice(&raw[32..]))
}

fn webauthn_credential(key: &p256::ecdsa::SigningKey) -> WebauthnSigner {
    WebauthnSigner {
        origin: b"https://wallet.example".to_vec(),
        rp_id_hash: B256::from(<[u8; 32]>::from(Sha256::digest(b"wallet.example"))),
        pubkey: p256_pubkey(key),
    }
}

/// Transaction signature words for `keys` signing `hash`, in order.
pub fn sign_with(keys: &[&TestKey], hash: Felt) -> Vec<Felt> {
    keys.iter()
        .map(|key| key.sign(hash))
        .collect::<Vec<_>>()
        .to_words()
}

pub fn transaction(calls: Vec<Call>, hash: u64, keys: &[&TestKey]) -> Transaction {
    let hash = U256::from(hash);
    Transaction {
        calls,
        signature: sign_with(keys, hash),
        hash,
        version: TX_V3,
        max_fee: 1_000_000,
    }
}

pub fn self_call(entrypoint: Entrypoint, calldata: Vec<Felt>) -> Call {
    Call::new(ACCOUNT, entrypoint.selector(), calldata)
}

pub fn transfer(amount: u64) -> Call {
    Call::new(
        TOKEN,
        accountkit_core::primitives::selector("transfer"),
        vec![U256::from(amount)],
    )
}

/// Owner is ed25519 seed 1, guardian is secp256k1 seed 2.
pub struct Fixture {
    pub account: SmartAccount,
    pub host: MockHost,
    pub owner: TestKey,
    pub guardian: TestKey,
}

impl Fixture {
    pub fn new() -> Self {
        let owner = TestKey::ed25519(1);
        let guardian = TestKey::secp256k1(2);
        let account = SmartAccount::new(
            ACCOUNT,
            AccountConfig::default(),
            &owner.signer(),
            Some(&guardian.signer()),
        )
        .unwrap();
        Self {
            account,
            host: MockHost::new(),
            owner,
            guardian,
        }
    }

    /// Validates and executes `calls` signed by `keys`.
    pub fn submit(&mut self, calls: Vec<Call>, hash: u64, keys: &[&TestKey]) -> AccountResult<Vec<Vec<Felt>>> {
        let tx = transaction(calls, hash, keys);
        self.account.submit(&mut self.host, &tx)
    }
}
