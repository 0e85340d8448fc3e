use anyhow::{anyhow, bail, Result};
use std::fs;
use std::path::{Path, PathBuf};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use log::info;
use rand::RngCore;

use crate::mail_reader::settings::ImapSettings;

const PASSWORD_FILE: &str = ".encrypted_password";
const KEY_FILE: &str = ".encryption_key";
const NONCE_LEN: usize = 12;

/// Keeps the IMAP password on disk encrypted with a locally generated
/// AES-256-GCM key.
pub struct CredentialStore {
    key_path: PathBuf,
    password_path: PathBuf,
}

impl Default for CredentialStore {
    fn default() -> Self {
        CredentialStore::in_dir(Path::new("."))
    }
}

impl CredentialStore {
    pub fn in_dir(dir: &Path) -> Self {
        CredentialStore {
            key_path: dir.join(KEY_FILE),
            password_path: dir.join(PASSWORD_FILE),
        }
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        let key_bytes = if self.key_path.exists() {
            fs::read(&self.key_path)?
        } else {
            let mut key_bytes = vec![0u8; 32];
            rand::thread_rng().fill_bytes(&mut key_bytes);
            fs::write(&self.key_path, &key_bytes)?;
            key_bytes
        };
        Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| anyhow!("Failed to create cipher from {}: {}", self.key_path.display(), e))
    }

    pub fn encrypt(&self, password: &str) -> Result<String> {
        let cipher = self.cipher()?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, password.as_bytes())
            .map_err(|e| anyhow!("Failed to encrypt password: {}", e))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(&combined))
    }

    pub fn decrypt(&self, encrypted: &str) -> Result<String> {
        let cipher = self.cipher()?;
        let combined = BASE64
            .decode(encrypted.trim())
            .map_err(|e| anyhow!("Failed to decode base64: {}", e))?;
        if combined.len() <= NONCE_LEN {
            bail!("Stored password is truncated");
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| anyhow!("Failed to decrypt password: {}", e))?;

        String::from_utf8(plaintext)
            .map_err(|e| anyhow!("Failed to convert decrypted bytes to string: {}", e))
    }

    /// Reads the stored password, prompting for it (and storing it) on first use.
    pub fn password(&self, username: &str) -> Result<String> {
        if self.password_path.exists() {
            let encrypted = fs::read_to_string(&self.password_path)?;
            return self.decrypt(&encrypted);
        }

        let password = rpassword::prompt_password(format!("Enter the password for {}: ", username))?;
        let encrypted = self.encrypt(&password)?;
        fs::write(&self.password_path, encrypted)?;
        info!("Password stored in {}", self.password_path.display());
        Ok(password)
    }
}

pub fn resolve_password(settings: &ImapSettings) -> Result<String> {
    match &settings.password {
        Some(password) => Ok(password.clone()),
        None => CredentialStore::default().password(&settings.username),
    }
}
