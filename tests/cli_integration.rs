//! Integration tests for the KeyVault CLI.
//!
//! These tests exercise the binary end-to-end using `assert_cmd`.
//! Passwords are supplied through `KEYVAULT_PASSWORD` so no test ever
//! reaches an interactive prompt.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

const PASSWORD: &str = "correct horse";

/// Helper: get a Command pointing at the keyvault binary.
fn keyvault() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("keyvault").expect("binary should exist")
}

/// Helper: a project dir with a fast KDF config.
fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    tmp.child(".keyvault.toml")
        .write_str("pbkdf2_iterations = 1000\n")
        .unwrap();
    tmp
}

fn run_in(dir: &TempDir) -> Command {
    let mut cmd = keyvault();
    cmd.current_dir(dir.path()).env("KEYVAULT_PASSWORD", PASSWORD);
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let out = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(out).unwrap().trim().to_string()
}

/// Ids of the records in one of the store's documents.
fn stored_ids(dir: &TempDir, document: &str) -> Vec<String> {
    let raw = std::fs::read_to_string(dir.path().join(".keyvault").join(document)).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    doc.as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Basics
// ---------------------------------------------------------------------------

#[test]
fn help_flag_shows_usage() {
    keyvault()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Local vault for AES and RSA keys"))
        .stdout(predicate::str::contains("aes"))
        .stdout(predicate::str::contains("rsa"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("encrypt-file"))
        .stdout(predicate::str::contains("decrypt-file"));
}

#[test]
fn version_flag_shows_version() {
    keyvault()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("keyvault"));
}

#[test]
fn no_args_shows_help() {
    keyvault()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn invalid_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    tmp.child(".keyvault.toml")
        .write_str("pbkdf2_iterations = 5\n")
        .unwrap();

    run_in(&tmp)
        .args(["aes", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pbkdf2_iterations"));
}

// ---------------------------------------------------------------------------
// AES
// ---------------------------------------------------------------------------

#[test]
fn aes_generate_and_list() {
    let tmp = project();

    run_in(&tmp)
        .args(["aes", "generate", "notes", "--bits", "192", "--purpose", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated 192-bit AES key 'notes'"));
    run_in(&tmp)
        .args(["aes", "generate", "disk", "--purpose", "file"])
        .assert()
        .success();

    run_in(&tmp)
        .args(["aes", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("notes"))
        .stdout(predicate::str::contains("disk"));

    run_in(&tmp)
        .args(["aes", "list", "--purpose", "file"])
        .assert()
        .success()
        .stdout(predicate::str::contains("disk"))
        .stdout(predicate::str::contains("notes").not());
}

#[test]
fn aes_text_roundtrip_with_password() {
    let tmp = project();

    let ct = stdout_of(run_in(&tmp).args(["aes", "encrypt", "Hello World"]));
    let pt = stdout_of(run_in(&tmp).args(["aes", "decrypt", &ct]));
    assert_eq!(pt, "Hello World");
}

#[test]
fn aes_text_roundtrip_with_stored_key() {
    let tmp = project();
    run_in(&tmp).args(["aes", "generate", "k"]).assert().success();
    let id = stored_ids(&tmp, "symmetric_keys.json").remove(0);

    let ct = stdout_of(run_in(&tmp).args(["aes", "encrypt", "secret text", "--key", &id]));
    let pt = stdout_of(run_in(&tmp).args(["aes", "decrypt", &ct, "--key", &id]));
    assert_eq!(pt, "secret text");
}

#[test]
fn aes_generate_rejects_bad_size() {
    let tmp = project();
    run_in(&tmp)
        .args(["aes", "generate", "k", "--bits", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));
}

// ---------------------------------------------------------------------------
// RSA
// ---------------------------------------------------------------------------

#[test]
fn rsa_roundtrip_and_pem() {
    let tmp = project();
    run_in(&tmp)
        .args(["rsa", "generate", "mail", "--bits", "1024", "--protect"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated 1024-bit RSA key pair"));
    let id = stored_ids(&tmp, "asymmetric_keys.json").remove(0);

    let ct = stdout_of(run_in(&tmp).args(["rsa", "encrypt", &id, "short message"]));
    let pt = stdout_of(run_in(&tmp).args(["rsa", "decrypt", &id, &ct]));
    assert_eq!(pt, "short message");

    let pem = stdout_of(run_in(&tmp).args(["rsa", "pem", &id]));
    assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
    assert!(pem.ends_with("-----END PUBLIC KEY-----"));

    run_in(&tmp)
        .args(["rsa", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("password protected"));
}

#[test]
fn rsa_decrypt_with_wrong_password_fails() {
    let tmp = project();
    run_in(&tmp)
        .args(["rsa", "generate", "mail", "--bits", "1024", "--protect"])
        .assert()
        .success();
    let id = stored_ids(&tmp, "asymmetric_keys.json").remove(0);
    let ct = stdout_of(run_in(&tmp).args(["rsa", "encrypt", &id, "hi"]));

    run_in(&tmp)
        .env("KEYVAULT_PASSWORD", "not the password")
        .args(["rsa", "decrypt", &id, &ct])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Authentication failed"));
}

#[test]
fn rsa_import_public_key_from_pem() {
    let tmp = project();
    run_in(&tmp)
        .args(["rsa", "generate", "mine", "--bits", "1024"])
        .assert()
        .success();
    let id = stored_ids(&tmp, "asymmetric_keys.json").remove(0);
    let pem = stdout_of(run_in(&tmp).args(["rsa", "pem", &id]));
    tmp.child("friend.pem").write_str(&pem).unwrap();

    run_in(&tmp)
        .args(["rsa", "import-public", "friend", "friend.pem"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1024-bit public key 'friend'"));

    let friend = stored_ids(&tmp, "asymmetric_keys.json").remove(1);
    run_in(&tmp)
        .args(["rsa", "decrypt", &friend, "AAAA"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no private key"));
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[test]
fn delete_removes_key() {
    let tmp = project();
    run_in(&tmp).args(["aes", "generate", "gone"]).assert().success();
    let id = stored_ids(&tmp, "symmetric_keys.json").remove(0);

    run_in(&tmp)
        .args(["delete", &id, "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted AES key 'gone'"));
    assert!(stored_ids(&tmp, "symmetric_keys.json").is_empty());
}

#[test]
fn delete_unknown_id_fails() {
    let tmp = project();
    run_in(&tmp)
        .args(["delete", "no-such-id", "--force"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

// ---------------------------------------------------------------------------
// Export / import
// ---------------------------------------------------------------------------

#[test]
fn export_then_import_into_another_store() {
    let tmp = project();
    run_in(&tmp).args(["aes", "generate", "a"]).assert().success();
    run_in(&tmp).args(["aes", "generate", "b"]).assert().success();

    run_in(&tmp)
        .args(["export", "--output", "bundle.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 key(s)"));
    tmp.child("bundle.json")
        .assert(predicate::str::contains("\"formatVersion\""));

    run_in(&tmp)
        .args(["--store-dir", "other", "import", "bundle.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 AES and 0 RSA key(s)"));

    run_in(&tmp)
        .args(["--store-dir", "other", "import", "bundle.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No new keys"));
}

#[test]
fn encrypted_export_needs_the_right_password() {
    let tmp = project();
    run_in(&tmp).args(["aes", "generate", "a"]).assert().success();

    run_in(&tmp)
        .args(["export", "--encrypt", "--output", "bundle.ejson"])
        .assert()
        .success();
    tmp.child("bundle.ejson")
        .assert(predicate::str::starts_with("KEYVAULT_KEY_EXPORT|"));

    run_in(&tmp)
        .env("KEYVAULT_PASSWORD", "wrong password")
        .args(["--store-dir", "other", "import", "bundle.ejson"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Authentication failed"));

    run_in(&tmp)
        .args(["--store-dir", "other", "import", "bundle.ejson"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 AES"));
}

#[test]
fn import_missing_file_fails() {
    let tmp = project();
    run_in(&tmp)
        .args(["import", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("import file not found"));
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[test]
fn file_encrypt_decrypt_roundtrip() {
    let tmp = project();
    let content = "line\n".repeat(5_000);
    tmp.child("report.txt").write_str(&content).unwrap();

    run_in(&tmp)
        .args(["encrypt-file", "report.txt"])
        .assert()
        .success();
    tmp.child("report.txt.enc").assert(predicate::path::exists());

    run_in(&tmp)
        .args(["decrypt-file", "report.txt.enc", "--output", "restored.txt"])
        .assert()
        .success();
    let restored = std::fs::read_to_string(tmp.path().join("restored.txt")).unwrap();
    assert_eq!(restored, content);
}

#[test]
fn file_decrypt_with_wrong_password_leaves_no_output() {
    let tmp = project();
    tmp.child("a.txt").write_str("some data").unwrap();
    run_in(&tmp).args(["encrypt-file", "a.txt"]).assert().success();

    // A wrong key almost always breaks the padding; the rare lucky
    // padding still yields output that differs from the original.
    let result = run_in(&tmp)
        .env("KEYVAULT_PASSWORD", "wrong password")
        .args(["decrypt-file", "a.txt.enc", "--output", "b.txt"])
        .output()
        .unwrap();
    if result.status.success() {
        let output = std::fs::read(tmp.path().join("b.txt")).unwrap_or_default();
        assert_ne!(output, b"some data");
    } else {
        tmp.child("b.txt").assert(predicate::path::missing());
    }
}

#[test]
fn file_decrypt_onto_its_own_input_is_refused() {
    let tmp = project();
    tmp.child("a.txt").write_str("some data").unwrap();
    run_in(&tmp).args(["encrypt-file", "a.txt"]).assert().success();
    let sealed = std::fs::read(tmp.path().join("a.txt.enc")).unwrap();

    run_in(&tmp)
        .args(["decrypt-file", "a.txt.enc", "--output", "./a.txt.enc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must differ"));
    assert_eq!(std::fs::read(tmp.path().join("a.txt.enc")).unwrap(), sealed);
}

#[test]
fn rsa_generate_rejects_sizes_above_4096() {
    let tmp = project();
    run_in(&tmp)
        .args(["rsa", "generate", "big", "--bits", "4608"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));
}

#[cfg(unix)]
#[test]
fn plaintext_export_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = project();
    run_in(&tmp).args(["aes", "generate", "a"]).assert().success();
    run_in(&tmp)
        .args(["export", "--output", "bundle.json"])
        .assert()
        .success();

    let mode = std::fs::metadata(tmp.path().join("bundle.json"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}
