//! Password-based stream and file encryption with progress reporting.
//!
//! Layout of an encrypted stream:
//!   [ 16-byte salt | 16-byte IV | AES-CBC ciphertext (PKCS#7) ]
//!
//! Input is processed in 8 KiB chunks so arbitrarily large files never
//! have to fit in memory.  When the total input length is known a
//! `ProgressListener` receives percentages in 0..=100, never decreasing,
//! ending with exactly one 100.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::crypto::kdf::{self, Pbkdf2Params, SALT_LEN};
use crate::crypto::secure_file;
use crate::crypto::symmetric::{
    self, Aes128CbcDec, Aes128CbcEnc, Aes192CbcDec, Aes192CbcEnc, Aes256CbcDec, Aes256CbcEnc,
    KeySize, BLOCK_LEN, IV_LEN,
};
use crate::errors::{KeyVaultError, Result};

/// Bytes read from the input per iteration.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Length of the salt + IV header.
pub const HEADER_LEN: usize = SALT_LEN + IV_LEN;

/// Receives progress updates (0-100) during long-running operations.
pub trait ProgressListener {
    fn on_progress(&mut self, percent: u8);
}

impl<F: FnMut(u8)> ProgressListener for F {
    fn on_progress(&mut self, percent: u8) {
        self(percent)
    }
}

/// A listener that ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressListener for NoProgress {
    fn on_progress(&mut self, _percent: u8) {}
}

struct ProgressTracker<'a> {
    total: Option<u64>,
    processed: u64,
    last: Option<u8>,
    listener: &'a mut dyn ProgressListener,
}

impl<'a> ProgressTracker<'a> {
    fn new(total: Option<u64>, listener: &'a mut dyn ProgressListener) -> Self {
        Self {
            total,
            processed: 0,
            last: None,
            listener,
        }
    }

    fn advance(&mut self, n: usize) {
        self.processed += n as u64;
        let Some(total) = self.total.filter(|t| *t > 0) else {
            return;
        };
        let percent = (self.processed.min(total) * 100 / total) as u8;
        if self.last.map_or(true, |last| percent > last) {
            self.last = Some(percent);
            self.listener.on_progress(percent);
        }
    }

    fn finish(&mut self) {
        if self.total.is_some() && self.last != Some(100) {
            self.last = Some(100);
            self.listener.on_progress(100);
        }
    }
}

/// Encrypt everything read from `reader` into `writer`.
///
/// `total_len` is the plaintext length if known; it only drives progress
/// reporting.  Returns the number of bytes written, header included.
pub fn encrypt_stream<R: Read, W: Write>(
    reader: R,
    mut writer: W,
    total_len: Option<u64>,
    password: &str,
    key_size: KeySize,
    params: &Pbkdf2Params,
    progress: &mut dyn ProgressListener,
) -> Result<u64> {
    let salt = kdf::generate_salt();
    let iv = symmetric::generate_iv();
    let key = kdf::derive_key_with_params(password.as_bytes(), &salt, key_size.bits(), params)?;

    writer.write_all(&salt)?;
    writer.write_all(&iv)?;

    let mut tracker = ProgressTracker::new(total_len, progress);
    let body = match key_size {
        KeySize::Aes128 => encrypt_blocks(
            init::<Aes128CbcEnc>(&key, &iv)?,
            reader,
            &mut writer,
            &mut tracker,
        )?,
        KeySize::Aes192 => encrypt_blocks(
            init::<Aes192CbcEnc>(&key, &iv)?,
            reader,
            &mut writer,
            &mut tracker,
        )?,
        KeySize::Aes256 => encrypt_blocks(
            init::<Aes256CbcEnc>(&key, &iv)?,
            reader,
            &mut writer,
            &mut tracker,
        )?,
    };
    writer.flush()?;
    tracker.finish();

    Ok(HEADER_LEN as u64 + body)
}

/// Decrypt a stream produced by `encrypt_stream`.
///
/// `total_len` is the full encrypted length (header included) if known.
/// The key size must match the one used for encryption.  A wrong
/// password fails with `AuthenticationFailed` once the final block is
/// reached; output already written before that point is garbage.
pub fn decrypt_stream<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    total_len: Option<u64>,
    password: &str,
    key_size: KeySize,
    params: &Pbkdf2Params,
    progress: &mut dyn ProgressListener,
) -> Result<u64> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    read_header(&mut reader, &mut salt)?;
    read_header(&mut reader, &mut iv)?;

    let key = kdf::derive_key_with_params(password.as_bytes(), &salt, key_size.bits(), params)?;

    let body_len = total_len.map(|t| t.saturating_sub(HEADER_LEN as u64));
    let mut tracker = ProgressTracker::new(body_len, progress);
    let written = match key_size {
        KeySize::Aes128 => decrypt_blocks(
            init::<Aes128CbcDec>(&key, &iv)?,
            reader,
            &mut writer,
            &mut tracker,
        )?,
        KeySize::Aes192 => decrypt_blocks(
            init::<Aes192CbcDec>(&key, &iv)?,
            reader,
            &mut writer,
            &mut tracker,
        )?,
        KeySize::Aes256 => decrypt_blocks(
            init::<Aes256CbcDec>(&key, &iv)?,
            reader,
            &mut writer,
            &mut tracker,
        )?,
    };
    writer.flush()?;
    tracker.finish();

    Ok(written)
}

fn read_header<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => KeyVaultError::DecryptionFailed,
        _ => KeyVaultError::Io(e),
    })
}

fn init<C: KeyIvInit>(key: &[u8], iv: &[u8]) -> Result<C> {
    C::new_from_slices(key, iv)
        .map_err(|e| KeyVaultError::EncryptionFailed(format!("cipher init: {e}")))
}

/// Read up to `buf.len()` bytes, retrying on `Interrupted`.
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn encrypt_blocks<E: BlockEncryptMut, R: Read, W: Write>(
    mut cipher: E,
    mut reader: R,
    writer: &mut W,
    tracker: &mut ProgressTracker<'_>,
) -> Result<u64> {
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut pending: Vec<u8> = Vec::with_capacity(CHUNK_SIZE + BLOCK_LEN);
    let mut written = 0u64;

    loop {
        let n = read_chunk(&mut reader, &mut chunk)?;
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&chunk[..n]);
        tracker.advance(n);

        let ready = pending.len() - pending.len() % BLOCK_LEN;
        for block in pending[..ready].chunks_exact_mut(BLOCK_LEN) {
            cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        writer.write_all(&pending[..ready])?;
        written += ready as u64;
        pending.drain(..ready);
    }

    // Whatever is left (possibly nothing) becomes the padded final block.
    let tail = cipher.encrypt_padded_vec_mut::<Pkcs7>(&pending);
    writer.write_all(&tail)?;
    written += tail.len() as u64;

    Ok(written)
}

fn decrypt_blocks<D: BlockDecryptMut, R: Read, W: Write>(
    mut cipher: D,
    mut reader: R,
    writer: &mut W,
    tracker: &mut ProgressTracker<'_>,
) -> Result<u64> {
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut pending: Vec<u8> = Vec::with_capacity(CHUNK_SIZE + BLOCK_LEN);
    let mut written = 0u64;

    loop {
        let n = read_chunk(&mut reader, &mut chunk)?;
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&chunk[..n]);
        tracker.advance(n);

        // Hold back the last whole block: it carries the padding.
        let whole = pending.len() - pending.len() % BLOCK_LEN;
        let ready = whole.saturating_sub(BLOCK_LEN);
        for block in pending[..ready].chunks_exact_mut(BLOCK_LEN) {
            cipher.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        writer.write_all(&pending[..ready])?;
        written += ready as u64;
        pending.drain(..ready);
    }

    if pending.len() != BLOCK_LEN {
        return Err(KeyVaultError::DecryptionFailed);
    }
    let tail = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&pending)
        .map_err(|_| KeyVaultError::AuthenticationFailed)?;
    writer.write_all(&tail)?;
    written += tail.len() as u64;

    Ok(written)
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// Encrypt the file at `source` into `destination`.
///
/// Output goes to a sibling temp file that replaces `destination` only
/// on success.  `destination` must not be `source` under another name.
pub fn encrypt_file(
    source: &Path,
    destination: &Path,
    password: &str,
    key_size: KeySize,
    params: &Pbkdf2Params,
    progress: &mut dyn ProgressListener,
) -> Result<u64> {
    let input = File::open(source)?;
    secure_file::ensure_distinct(source, destination)?;
    let total = input.metadata()?.len();

    log::info!("encrypting {} ({total} bytes)", source.display());
    write_then_rename(destination, |output| {
        encrypt_stream(
            BufReader::new(input),
            BufWriter::new(output),
            Some(total),
            password,
            key_size,
            params,
            progress,
        )
    })
}

/// Decrypt the file at `source` into `destination`.
///
/// On failure `destination` is left exactly as it was.
pub fn decrypt_file(
    source: &Path,
    destination: &Path,
    password: &str,
    key_size: KeySize,
    params: &Pbkdf2Params,
    progress: &mut dyn ProgressListener,
) -> Result<u64> {
    let input = File::open(source)?;
    secure_file::ensure_distinct(source, destination)?;
    let total = input.metadata()?.len();

    log::info!("decrypting {} ({total} bytes)", source.display());
    write_then_rename(destination, |output| {
        decrypt_stream(
            BufReader::new(input),
            BufWriter::new(output),
            Some(total),
            password,
            key_size,
            params,
            progress,
        )
    })
}

fn write_then_rename<F>(destination: &Path, fill: F) -> Result<u64>
where
    F: FnOnce(File) -> Result<u64>,
{
    let tmp_path = secure_file::sibling_temp_path(destination)?;
    let output = secure_file::create_owner_only(&tmp_path)?;

    let result = fill(output).and_then(|written| {
        fs::rename(&tmp_path, destination)?;
        Ok(written)
    });
    if result.is_err() {
        if let Err(e) = fs::remove_file(&tmp_path) {
            log::warn!("could not remove partial output {}: {e}", tmp_path.display());
        }
    }
    result
}
