use super::utils::ensure_dir;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use std::env;
use std::path::PathBuf;
use tracing::debug;

use super::crypto::load_or_generate_key;

/// Runtime context holding paths and the store encryption key.
pub struct AppCtx {
    pub config_path: PathBuf,
    pub store_path: PathBuf,
    pub key_path: PathBuf,
    pub cipher: Aes256Gcm,
}

impl AppCtx {
    /// Opens `~/.prompt-relay` (or `home` when given), creating it and the
    /// key file on first use.
    pub fn init(home: Option<PathBuf>) -> Result<Self, String> {
        let base_dir = match home {
            Some(dir) => dir,
            None => {
                let home = env::var("HOME")
                    .map_err(|_| "Unable to determine HOME directory".to_string())?;
                PathBuf::from(home).join(".prompt-relay")
            }
        };
        let key_dir = base_dir.join("keys");
        let key_path = key_dir.join("key.bin");

        ensure_dir(&base_dir)?;
        ensure_dir(&key_dir)?;

        let password = env::var("PROMPT_RELAY_PASSWORD").ok();
        let (key_bytes, key_from_password) = load_or_generate_key(&key_path, password.as_deref())?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
        debug!(home = %base_dir.display(), key_from_password, "store key loaded");

        Ok(Self {
            config_path: base_dir.join("config.toml"),
            store_path: base_dir.join("store.db"),
            key_path,
            cipher,
        })
    }
}

/// Encrypts `plaintext` as base64(nonce || ciphertext).
pub fn seal(cipher: &Aes256Gcm, plaintext: &[u8]) -> Result<String, String> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let cipher_bytes = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| "Encrypt error".to_string())?;

    let mut out = Vec::with_capacity(12 + cipher_bytes.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&cipher_bytes);
    Ok(general_purpose::STANDARD.encode(&out))
}

/// Reverses [`seal`].
pub fn open(cipher: &Aes256Gcm, encoded: &str) -> Result<Vec<u8>, String> {
    let decoded = general_purpose::STANDARD
        .decode(encoded.trim_end())
        .map_err(|_| "Corrupted data".to_string())?;
    if decoded.len() < 12 {
        return Err("Corrupted data".to_string());
    }
    let (nonce_bytes, cipher_bytes) = decoded.split_at(12);
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), cipher_bytes)
        .map_err(|_| "Decrypt error. Check key or password.".to_string())
}
