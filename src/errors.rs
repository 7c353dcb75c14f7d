use thiserror::Error;

/// All errors that can occur in KeyVault.
#[derive(Debug, Error)]
pub enum KeyVaultError {
    // --- Input validation ---
    #[error("Invalid input: {0}")]
    Validation(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: corrupted data or wrong key")]
    DecryptionFailed,

    #[error("Authentication failed: wrong password or corrupted data")]
    AuthenticationFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("Operation was cancelled")]
    Cancelled,

    // --- Repository errors ---
    #[error("Key '{0}' not found")]
    NotFound(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,
}

/// Convenience type alias for KeyVault results.
pub type Result<T> = std::result::Result<T, KeyVaultError>;
