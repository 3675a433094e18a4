//! Integration tests: signers.

mod common;

use std::collections::HashSet;

use accountkit_core::codec::{decode_all, Encode};
use accountkit_core::{
    AccountConfig, AccountError, EcdsaScalars, Signer, SignerSignature, SmartAccount, VALIDATED,
};
use alloy_primitives::{uint, Address, U256};
use common::{transaction, transfer, MockHost, TestKey, ACCOUNT};
use test_case::test_case;

const SECP256K1_ORDER: U256 =
    uint!(0xfffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141_U256);

#[test_case(TestKey::ed25519(1) ; "ed25519")]
#[test_case(TestKey::secp256k1(1) ; "secp256k1")]
#[test_case(TestKey::secp256r1(1) ; "secp256r1")]
#[test_case(TestKey::eip191(1) ; "eip191")]
#[test_case(TestKey::webauthn(1) ; "webauthn")]
fn test_signer_kind_controls_account(key: TestKey) {
    let signer = key.signer();
    let decoded: Signer = decode_all(&signer.to_words()).unwrap();
    assert_eq!(decoded, signer);
    assert_eq!(decoded.guid(), signer.guid());

    let mut account =
        SmartAccount::new(ACCOUNT, AccountConfig::default(), &signer, None).unwrap();
    let mut host = MockHost::new();
    let tx = transaction(vec![transfer(1)], 0x1234, &[&key]);
    account.submit(&mut host, &tx).unwrap();

    let hash = U256::from(0x5678);
    let signature = vec![key.sign(hash)].to_words();
    assert_eq!(account.is_valid_signature(hash, &signature), VALIDATED);
    assert_eq!(
        account.is_valid_signature(hash + U256::from(1), &signature),
        U256::ZERO
    );
}

#[test]
fn test_guids_are_distinct_across_kinds() {
    let guids: HashSet<_> = TestKey::all_kinds(1)
        .iter()
        .chain(TestKey::all_kinds(2).iter())
        .map(TestKey::guid)
        .collect();
    assert_eq!(guids.len(), 10);
}

#[test]
fn test_secp256k1_and_eip191_are_not_interchangeable() {
    let raw = TestKey::secp256k1(4);
    let personal = TestKey::eip191(4);
    let hash = U256::from(99);

    let SignerSignature::Secp256k1 { signature, .. } = raw.sign(hash) else {
        panic!("unexpected signature kind");
    };
    let relabeled = SignerSignature::Eip191 {
        signer: personal.signer(),
        signature,
    };
    assert!(raw.sign(hash).is_valid_signature(hash));
    assert!(!relabeled.is_valid_signature(hash));
}

#[test]
fn test_rejects_high_s_secp256k1_signature() {
    let key = TestKey::secp256k1(5);
    let hash = U256::from(7);
    let SignerSignature::Secp256k1 { signer, signature } = key.sign(hash) else {
        panic!("unexpected signature kind");
    };
    let malleated = SignerSignature::Secp256k1 {
        signer,
        signature: EcdsaScalars {
            r: signature.r,
            s: SECP256K1_ORDER - signature.s,
            y_parity: !signature.y_parity,
        },
    };
    assert!(!malleated.is_valid_signature(hash));
}

#[test]
fn test_rejects_malformed_signers() {
    let zero_address = Signer::Eip191 {
        eth_address: Address::ZERO,
    };
    assert_eq!(
        SmartAccount::new(ACCOUNT, AccountConfig::default(), &zero_address, None).unwrap_err(),
        AccountError::InvalidSigner
    );
    let zero_key = Signer::Ed25519 {
        pubkey: U256::ZERO,
    };
    assert_eq!(zero_key.validate(), Err(AccountError::InvalidSigner));
}

#[test]
fn test_signature_from_wrong_key_rejected() {
    let owner = TestKey::webauthn(1);
    let intruder = TestKey::webauthn(2);
    let account =
        SmartAccount::new(ACCOUNT, AccountConfig::default(), &owner.signer(), None).unwrap();
    let hash = U256::from(11);

    let SignerSignature::Webauthn { assertion, .. } = intruder.sign(hash) else {
        panic!("unexpected signature kind");
    };
    let forged = SignerSignature::Webauthn {
        signer: owner.signer(),
        assertion,
    };
    assert_eq!(
        account.is_valid_signature(hash, &vec![forged].to_words()),
        U256::ZERO
    );
}
