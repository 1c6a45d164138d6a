use std::sync::OnceLock;

use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::SeedableRng;

use ota_sign::{
    ImageError, ImageVerifier, KeyPair, RsaImageSigner, SIGNATURE_LEN, digest, generate_key_pair,
    generate_key_pair_with_rng,
};

fn seeded_keys(seed: u8) -> KeyPair {
    let mut rng = ChaCha20Rng::from_seed([seed; 32]);
    generate_key_pair_with_rng(&mut rng, 2048).unwrap()
}

fn release_keys() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| seeded_keys(0x51))
}

fn other_keys() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| seeded_keys(0x52))
}

fn signer(keys: &KeyPair) -> RsaImageSigner {
    RsaImageSigner::new(keys.private_key().clone()).unwrap()
}

fn verifier(keys: &KeyPair) -> ImageVerifier {
    ImageVerifier::new(keys.public_key().clone()).unwrap()
}

// ── Round trip ───────────────────────────────────────────────────────

#[test]
fn ten_zero_bytes_roundtrip() {
    let raw = [0u8; 10];
    let signed = signer(release_keys()).sign(&raw).unwrap();
    assert_eq!(signed.len(), 10 + SIGNATURE_LEN);

    let payload = verifier(release_keys()).verify(signed.as_bytes()).unwrap();
    assert_eq!(payload, &raw);
}

#[test]
fn roundtrip_for_assorted_payloads() {
    let signer = signer(release_keys());
    let verifier = verifier(release_keys());
    let payloads: Vec<Vec<u8>> = vec![
        vec![0xff],
        b"short".to_vec(),
        vec![0u8; SIGNATURE_LEN],
        (0..10_000u32).map(|i| (i ^ (i >> 8)) as u8).collect(),
    ];
    for raw in payloads {
        let signed = signer.sign(&raw).unwrap();
        assert_eq!(verifier.verify_owned(signed.into_bytes()).unwrap(), raw);
    }
}

#[test]
fn signing_leaves_payload_untouched() {
    let raw = b"immutable firmware".to_vec();
    let before = raw.clone();
    let signed = signer(release_keys()).sign(&raw).unwrap();
    assert_eq!(raw, before);
    assert_eq!(signed.payload(), before.as_slice());
}

// ── Tamper detection ─────────────────────────────────────────────────

#[test]
fn any_flipped_byte_is_rejected() {
    let signed = signer(release_keys()).sign(&[0u8; 10]).unwrap().into_bytes();
    let verifier = verifier(release_keys());

    for i in 0..signed.len() {
        let mut tampered = signed.clone();
        tampered[i] ^= 1 << (i % 8);
        let err = verifier.verify(&tampered).unwrap_err();
        assert!(
            matches!(err, ImageError::SignatureMismatch),
            "byte {i} flip gave {err:?}"
        );
    }
}

#[test]
fn appended_or_dropped_bytes_are_rejected() {
    let signed = signer(release_keys()).sign(b"firmware image").unwrap().into_bytes();
    let verifier = verifier(release_keys());

    let mut extended = signed.clone();
    extended.push(0);
    assert!(matches!(verifier.verify(&extended), Err(ImageError::SignatureMismatch)));

    let truncated = &signed[1..];
    assert!(matches!(verifier.verify(truncated), Err(ImageError::SignatureMismatch)));
}

// ── Wrong key ────────────────────────────────────────────────────────

#[test]
fn wrong_key_is_rejected() {
    let signed = signer(release_keys()).sign(b"release 1.2.0").unwrap();
    let err = verifier(other_keys()).verify(signed.as_bytes()).unwrap_err();
    assert!(matches!(err, ImageError::SignatureMismatch));
}

#[test]
fn generated_key_pairs_are_independent() {
    let first = generate_key_pair(2048).unwrap();
    let second = generate_key_pair(2048).unwrap();
    assert_ne!(first.private_key(), second.private_key());

    let raw = b"cross check";
    let by_first = signer(&first).sign(raw).unwrap();
    let by_second = signer(&second).sign(raw).unwrap();
    assert!(matches!(
        verifier(&second).verify(by_first.as_bytes()),
        Err(ImageError::SignatureMismatch)
    ));
    assert!(matches!(
        verifier(&first).verify(by_second.as_bytes()),
        Err(ImageError::SignatureMismatch)
    ));
}

// ── Minimum length ───────────────────────────────────────────────────

#[test]
fn truncated_to_255_bytes_is_malformed() {
    let signed = signer(release_keys()).sign(&[0u8; 10]).unwrap();
    let truncated = &signed.as_bytes()[..SIGNATURE_LEN - 1];
    let err = verifier(release_keys()).verify(truncated).unwrap_err();
    assert!(matches!(err, ImageError::MalformedImage { len: 255, min: 256 }));
    assert!(err.is_rejection());
}

#[test]
fn bare_signature_is_malformed() {
    let signed = signer(release_keys()).sign(&[0u8; 10]).unwrap();
    let err = verifier(release_keys()).verify(signed.signature()).unwrap_err();
    assert!(matches!(err, ImageError::MalformedImage { len: SIGNATURE_LEN, .. }));
}

// ── Digest ───────────────────────────────────────────────────────────

#[test]
fn digest_is_pure_and_distinguishes_inputs() {
    let image = vec![0x42u8; 1500];
    assert_eq!(digest(&image), digest(&image));

    let mut other = image.clone();
    other[1499] = 0x43;
    assert_ne!(digest(&image), digest(&other));
}

// ── Key files ────────────────────────────────────────────────────────

#[test]
fn keys_survive_pem_files() {
    let dir = tempfile::tempdir().unwrap();
    let private_path = dir.path().join("sign_priv.key");
    let public_path = dir.path().join("main/certs/sign_pub.key");
    release_keys().save(&private_path, &public_path).unwrap();

    let signer = RsaImageSigner::from_pem_file(&private_path).unwrap();
    let verifier = ImageVerifier::from_pem_file(&public_path).unwrap();
    let signed = signer.sign(b"from disk").unwrap();
    assert_eq!(verifier.verify(signed.as_bytes()).unwrap(), b"from disk");
    assert_eq!(signer.fingerprint().unwrap(), verifier.fingerprint().unwrap());
}

#[test]
fn unreadable_key_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = RsaImageSigner::from_pem_file(&dir.path().join("missing.key"))
        .err()
        .unwrap();
    assert!(matches!(err, ImageError::Io(_)));
}
