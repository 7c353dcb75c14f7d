//! Integration tests for the KeyVault crypto layer.

use std::fs;

use keyvault::crypto::asymmetric::{self, PKCS1_OVERHEAD};
use keyvault::crypto::kdf::{self, Pbkdf2Params};
use keyvault::crypto::pem::{self, PemKind};
use keyvault::crypto::private_key;
use keyvault::crypto::stream;
use keyvault::crypto::symmetric::{self, KeySize};
use keyvault::errors::KeyVaultError;
use tempfile::TempDir;

const FAST: Pbkdf2Params = Pbkdf2Params { iterations: 1_000 };

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

#[test]
fn derivation_is_deterministic_and_salted() {
    let salt_a = kdf::generate_salt();
    let salt_b = kdf::generate_salt();
    assert_ne!(salt_a, salt_b);

    for bits in [128, 192, 256] {
        let k1 = kdf::derive_key_with_params(b"pw", &salt_a, bits, &FAST).unwrap();
        let k2 = kdf::derive_key_with_params(b"pw", &salt_a, bits, &FAST).unwrap();
        let k3 = kdf::derive_key_with_params(b"pw", &salt_b, bits, &FAST).unwrap();
        assert_eq!(k1.len(), bits as usize / 8);
        assert_eq!(*k1, *k2);
        assert_ne!(*k1, *k3);
    }
}

#[test]
fn derivation_rejects_empty_salt() {
    assert!(matches!(
        kdf::derive_key(b"pw", &[], 256),
        Err(KeyVaultError::KeyDerivationFailed(_))
    ));
}

// ---------------------------------------------------------------------------
// AES-CBC
// ---------------------------------------------------------------------------

#[test]
fn aes_roundtrip_for_every_key_size() {
    let messages: Vec<Vec<u8>> = vec![
        Vec::new(),
        b"a".to_vec(),
        vec![0u8; 16],
        (0..=255u8).collect(),
        vec![0xA5; 1000],
    ];

    for bits in [128, 192, 256] {
        let key = symmetric::generate_key(bits).unwrap();
        assert_eq!(key.len(), bits as usize / 8);

        for m in &messages {
            let iv = symmetric::generate_iv();
            let ct = symmetric::encrypt(m, &key, &iv).unwrap();
            assert_eq!(ct.len() % 16, 0);
            assert!(ct.len() > m.len());
            assert_eq!(&symmetric::decrypt(&ct, &key, &iv).unwrap(), m);
        }
    }
}

#[test]
fn hello_world_with_fixed_aes256_key() {
    let key = b"0123456789ABCDEF0123456789ABCDEF";
    let iv = symmetric::generate_iv();

    let ct = symmetric::encrypt(b"Hello World", key, &iv).unwrap();
    let pt = symmetric::decrypt(&ct, key, &iv).unwrap();
    assert_eq!(String::from_utf8(pt).unwrap(), "Hello World");
}

#[test]
fn unsupported_key_size_is_validation_error() {
    assert!(matches!(symmetric::generate_key(64), Err(KeyVaultError::Validation(_))));
    assert!(matches!(KeySize::from_bits(512), Err(KeyVaultError::Validation(_))));
}

#[test]
fn random_bytes_have_requested_length() {
    assert_eq!(symmetric::generate_random_bytes(0).len(), 0);
    assert_eq!(symmetric::generate_random_bytes(37).len(), 37);
}

#[test]
fn text_encryption_with_key_or_password() {
    let key = symmetric::generate_key(192).unwrap();
    let encoded_key = keyvault::crypto::encoding::encode(&key);

    let ct =
        symmetric::encrypt_text("attack at dawn", &encoded_key, KeySize::Aes192, &FAST).unwrap();
    assert_eq!(
        symmetric::decrypt_text(&ct, &encoded_key, KeySize::Aes192, &FAST).unwrap(),
        "attack at dawn"
    );

    let ct = symmetric::encrypt_text("attack at dawn", "hunter22", KeySize::Aes256, &FAST).unwrap();
    assert_eq!(
        symmetric::decrypt_text(&ct, "hunter22", KeySize::Aes256, &FAST).unwrap(),
        "attack at dawn"
    );
}

// ---------------------------------------------------------------------------
// RSA
// ---------------------------------------------------------------------------

#[test]
fn rsa_plaintext_limit_is_key_bytes_minus_11() {
    let pair = asymmetric::generate_key_pair(1024).unwrap();
    let limit = 1024 / 8 - PKCS1_OVERHEAD;

    let fits = "x".repeat(limit);
    let ct = asymmetric::encrypt(&fits, &pair.public_key).unwrap();
    assert_eq!(asymmetric::decrypt(&ct, &pair.private_key).unwrap(), fits);

    let too_long = "x".repeat(limit + 1);
    match asymmetric::encrypt(&too_long, &pair.public_key) {
        Err(KeyVaultError::Validation(msg)) => assert!(msg.contains(&limit.to_string())),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn rsa_encryption_is_randomized() {
    let pair = asymmetric::generate_key_pair(1024).unwrap();
    let a = asymmetric::encrypt("same", &pair.public_key).unwrap();
    let b = asymmetric::encrypt("same", &pair.public_key).unwrap();
    assert_ne!(a, b);
}

#[test]
fn rsa_decrypt_with_wrong_key_fails() {
    let alice = asymmetric::generate_key_pair(1024).unwrap();
    let bob = asymmetric::generate_key_pair(1024).unwrap();

    let ct = asymmetric::encrypt("for alice", &alice.public_key).unwrap();
    assert!(matches!(
        asymmetric::decrypt(&ct, &bob.private_key),
        Err(KeyVaultError::DecryptionFailed)
    ));
    assert!(matches!(
        asymmetric::decrypt("%%%", &alice.private_key),
        Err(KeyVaultError::DecryptionFailed)
    ));
}

#[test]
fn pem_roundtrip_for_generated_keys() {
    let pair = asymmetric::generate_key_pair(1024).unwrap();

    let public_pem = pem::public_key_to_pem(&pair.public_key);
    assert!(public_pem.starts_with("-----BEGIN PUBLIC KEY-----\n"));
    assert!(public_pem.ends_with("\n-----END PUBLIC KEY-----"));
    assert!(public_pem.lines().all(|l| l.len() <= 64));
    assert_eq!(
        pem::extract_base64_from_pem(&public_pem, PemKind::PublicKey).unwrap(),
        pair.public_key
    );
    assert!(asymmetric::is_valid_public_key(&pair.public_key));

    let private_pem = pem::private_key_to_pem(&pair.private_key);
    assert_eq!(
        pem::extract_base64_from_pem(&private_pem, PemKind::PrivateKey).unwrap(),
        *pair.private_key
    );
    assert!(pem::extract_base64_from_pem(&private_pem, PemKind::PublicKey).is_err());
}

#[test]
fn background_generation_and_cancellation() {
    let job = asymmetric::spawn_key_pair(1024).unwrap();
    let pair = job.wait().unwrap();
    assert_eq!(pair.bits, 1024);
    assert_eq!(asymmetric::public_key_bits(&pair.public_key).unwrap(), 1024);

    let job = asymmetric::spawn_key_pair(1024).unwrap();
    job.cancel();
    assert!(matches!(job.wait(), Err(KeyVaultError::Cancelled)));
}

// ---------------------------------------------------------------------------
// Private key protection
// ---------------------------------------------------------------------------

#[test]
fn private_key_vault_roundtrip_and_wrong_password() {
    let pair = asymmetric::generate_key_pair(1024).unwrap();
    let locked = private_key::encrypt_private_key(&pair.private_key, "pw", &FAST).unwrap();

    let unlocked = private_key::decrypt_private_key(&locked, "pw", &FAST).unwrap();
    assert_eq!(*unlocked, *pair.private_key);

    for wrong in ["", "PW", "pw ", "another password"] {
        assert!(matches!(
            private_key::decrypt_private_key(&locked, wrong, &FAST),
            Err(KeyVaultError::AuthenticationFailed)
        ));
    }
}

// ---------------------------------------------------------------------------
// File encryption
// ---------------------------------------------------------------------------

#[test]
fn file_roundtrip_reports_progress() {
    let dir = TempDir::new().unwrap();
    let plain = dir.path().join("data.bin");
    let sealed = dir.path().join("data.bin.enc");
    let opened = dir.path().join("data.out");

    let content: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
    fs::write(&plain, &content).unwrap();

    let mut seen = Vec::new();
    let mut record = |p: u8| seen.push(p);
    stream::encrypt_file(&plain, &sealed, "pw", KeySize::Aes128, &FAST, &mut record).unwrap();
    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));

    stream::decrypt_file(
        &sealed,
        &opened,
        "pw",
        KeySize::Aes128,
        &FAST,
        &mut keyvault::crypto::NoProgress,
    )
    .unwrap();
    assert_eq!(fs::read(&opened).unwrap(), content);
}

#[test]
fn failed_file_decryption_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let sealed = dir.path().join("short.enc");
    let opened = dir.path().join("short.out");
    fs::write(&sealed, [0u8; 40]).unwrap();

    assert!(stream::decrypt_file(
        &sealed,
        &opened,
        "pw",
        KeySize::Aes256,
        &FAST,
        &mut keyvault::crypto::NoProgress,
    )
    .is_err());
    assert!(!opened.exists());
}

#[test]
fn file_operations_refuse_to_overwrite_their_own_input() {
    let dir = TempDir::new().unwrap();
    let plain = dir.path().join("a.txt");
    fs::write(&plain, "only copy").unwrap();
    let alias = dir.path().join(".").join("a.txt");

    let result = stream::encrypt_file(
        &plain,
        &alias,
        "pw",
        KeySize::Aes256,
        &FAST,
        &mut keyvault::crypto::NoProgress,
    );
    assert!(matches!(result, Err(KeyVaultError::Validation(_))));
    assert_eq!(fs::read_to_string(&plain).unwrap(), "only copy");

    let sealed = dir.path().join("a.txt.enc");
    stream::encrypt_file(
        &plain,
        &sealed,
        "pw",
        KeySize::Aes256,
        &FAST,
        &mut keyvault::crypto::NoProgress,
    )
    .unwrap();
    let sealed_bytes = fs::read(&sealed).unwrap();

    let result = stream::decrypt_file(
        &sealed,
        &dir.path().join(".").join("a.txt.enc"),
        "pw",
        KeySize::Aes256,
        &FAST,
        &mut keyvault::crypto::NoProgress,
    );
    assert!(matches!(result, Err(KeyVaultError::Validation(_))));
    assert_eq!(fs::read(&sealed).unwrap(), sealed_bytes);
}

#[test]
fn failed_decryption_keeps_an_existing_destination() {
    let dir = TempDir::new().unwrap();
    let sealed = dir.path().join("short.enc");
    let existing = dir.path().join("notes.txt");
    fs::write(&sealed, [0u8; 40]).unwrap();
    fs::write(&existing, "keep me").unwrap();

    assert!(stream::decrypt_file(
        &sealed,
        &existing,
        "pw",
        KeySize::Aes256,
        &FAST,
        &mut keyvault::crypto::NoProgress,
    )
    .is_err());
    assert_eq!(fs::read_to_string(&existing).unwrap(), "keep me");

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn rsa_sizes_beyond_the_usable_range_are_rejected() {
    assert_eq!(asymmetric::MAX_KEY_BITS, 4096);
    assert!(matches!(
        asymmetric::generate_key_pair(4608),
        Err(KeyVaultError::Validation(_))
    ));
}
