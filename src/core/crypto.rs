use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::Argon2;
use dialoguer::Password;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use super::utils::ensure_dir;

const MAGIC_PSWD: &[u8; 4] = b"PSWD";

/// Decrypts the master key using a provided password.
pub fn decrypt_key_with_password(key_data: &[u8], password: &str) -> Result<Vec<u8>, String> {
    if !key_data.starts_with(MAGIC_PSWD) {
        return Err("Key is not password protected.".to_string());
    }
    if key_data.len() < 4 + 16 + 12 {
        return Err("Corrupted password key".to_string());
    }
    let salt = &key_data[4..20];
    let nonce = Nonce::from_slice(&key_data[20..32]);
    let cipher_bytes = &key_data[32..];

    let mut pwd_key = [0u8; 32];
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut pwd_key)
        .map_err(|_| "KDF error".to_string())?;

    let tmp_cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&pwd_key));
    let raw = tmp_cipher
        .decrypt(nonce, cipher_bytes)
        .map_err(|_| "Invalid password".to_string())?;

    if raw.len() != 32 {
        return Err("Corrupted key".to_string());
    }
    Ok(raw)
}

/// Loads the store key, generating a plain one on first use.
///
/// A password-protected key is unlocked with `password` when given,
/// otherwise the user is prompted. Returns the raw key and whether it was
/// password protected.
pub fn load_or_generate_key(path: &Path, password: Option<&str>) -> Result<(Vec<u8>, bool), String> {
    if path.exists() {
        let mut buf = Vec::new();
        File::open(path)
            .map_err(|e| format!("Unable to open key: {}", e))?
            .read_to_end(&mut buf)
            .map_err(|e| format!("Unable to read key: {}", e))?;

        if buf.starts_with(MAGIC_PSWD) {
            let password = match password {
                Some(p) => p.to_string(),
                None => Password::new()
                    .with_prompt("Password")
                    .interact()
                    .map_err(|e| format!("Password error: {}", e))?,
            };
            let raw = decrypt_key_with_password(&buf, &password)?;
            Ok((raw, true))
        } else {
            if buf.len() != 32 {
                return Err("Invalid key length".to_string());
            }
            Ok((buf, false))
        }
    } else {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let key = Aes256Gcm::generate_key(OsRng);
        let mut f = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| format!("Key write error: {}", e))?;
        f.write_all(&key)
            .map_err(|e| format!("Key write error: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600)).ok();
        }
        Ok((key.to_vec(), false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::aead::AeadCore;

    fn protect(key: &[u8], password: &str) -> Vec<u8> {
        let salt = [7u8; 16];
        let mut pwd_key = [0u8; 32];
        Argon2::default()
            .hash_password_into(password.as_bytes(), &salt, &mut pwd_key)
            .unwrap();
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&pwd_key));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = cipher.encrypt(&nonce, key).unwrap();

        let mut out = MAGIC_PSWD.to_vec();
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        out
    }

    #[test]
    fn generated_key_is_reloaded_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("key.bin");
        let (first, protected) = load_or_generate_key(&path, None).unwrap();
        assert!(!protected);
        assert_eq!(first.len(), 32);
        let (second, _) = load_or_generate_key(&path, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn password_protected_key_unlocks_with_the_right_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.bin");
        let raw = [3u8; 32];
        fs::write(&path, protect(&raw, "hunter2")).unwrap();

        let (key, protected) = load_or_generate_key(&path, Some("hunter2")).unwrap();
        assert!(protected);
        assert_eq!(key, raw.to_vec());
        assert_eq!(
            load_or_generate_key(&path, Some("wrong")).unwrap_err(),
            "Invalid password"
        );
    }
}
