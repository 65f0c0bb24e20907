use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use chacha20poly1305::{
    aead::{rand_core::RngCore, Aead, OsRng},
    ChaCha20Poly1305, KeyInit, Nonce,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{errors::Error, Result};

const MAGIC: &[u8; 4] = b"TGCP";
const FORMAT_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const ITERATIONS_LEN: usize = 4;
const HEADER_LEN: usize = MAGIC.len() + 1 + ITERATIONS_LEN + SALT_LEN + NONCE_LEN;
/// Upper bound accepted from a file header.
const MAX_KDF_ITERATIONS: u32 = 10_000_000;

pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Telegram API credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_id: String,
    pub api_hash: String,
    pub bot_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("bot_token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        !self.bot_token.trim().is_empty()
    }
}

/// Password-encrypted credentials file.
///
/// Layout: `TGCP` magic, version byte, PBKDF2 iteration count (u32 LE),
/// random salt, random nonce, then the ChaCha20-Poly1305 ciphertext of the
/// JSON credentials. The key is PBKDF2-HMAC-SHA256 of the password over the
/// per-file salt. `iterations` only applies to newly written files; reading
/// uses the count stored in the header.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    path: PathBuf,
    iterations: u32,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>, iterations: u32) -> Self {
        Self {
            path: path.into(),
            iterations,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// `Ok(None)` when no credentials file exists.
    pub fn load(&self, password: &str) -> Result<Option<Credentials>> {
        let data = match fs::read(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        decrypt(&data, password).map(Some)
    }

    pub fn save(&self, creds: &Credentials, password: &str) -> Result<()> {
        let data = encrypt(creds, password, self.iterations)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        write_private(&self.path, &data)
    }

    pub fn delete(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn encrypt(creds: &Credentials, password: &str, iterations: u32) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = cipher_for(password, &salt, iterations)?;
    let mut plaintext = serde_json::to_vec(creds)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_slice())
        .map_err(|e| Error::Credentials(format!("encryption failed: {e}")));
    plaintext.zeroize();
    let ciphertext = ciphertext?;

    let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&iterations.to_le_bytes());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub fn decrypt(data: &[u8], password: &str) -> Result<Credentials> {
    if data.len() <= HEADER_LEN || &data[..MAGIC.len()] != MAGIC {
        return Err(Error::Credentials(
            "unrecognized credentials file format".to_string(),
        ));
    }
    let version = data[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(Error::Credentials(format!(
            "unsupported credentials file version {version}"
        )));
    }

    let iter_start = MAGIC.len() + 1;
    let salt_start = iter_start + ITERATIONS_LEN;
    let nonce_start = salt_start + SALT_LEN;

    let mut iter_bytes = [0u8; ITERATIONS_LEN];
    iter_bytes.copy_from_slice(&data[iter_start..salt_start]);
    let iterations = u32::from_le_bytes(iter_bytes);
    if iterations == 0 || iterations > MAX_KDF_ITERATIONS {
        return Err(Error::Credentials(format!(
            "implausible key derivation iteration count {iterations}"
        )));
    }
    let salt = &data[salt_start..nonce_start];
    let nonce = Nonce::from_slice(&data[nonce_start..HEADER_LEN]);

    let cipher = cipher_for(password, salt, iterations)?;
    let mut plaintext = cipher
        .decrypt(nonce, &data[HEADER_LEN..])
        .map_err(|_| Error::Credentials("wrong password or corrupted file".to_string()))?;

    let parsed = serde_json::from_slice::<Credentials>(&plaintext);
    plaintext.zeroize();
    parsed.map_err(|e| Error::Credentials(format!("decrypted data is not valid: {e}")))
}

fn cipher_for(password: &str, salt: &[u8], iterations: u32) -> Result<ChaCha20Poly1305> {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    let cipher = ChaCha20Poly1305::new_from_slice(&key)
        .map_err(|_| Error::Credentials("invalid key length".to_string()));
    key.zeroize();
    cipher
}

fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        let mut file = fs::File::create(path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }

    Ok(())
}
