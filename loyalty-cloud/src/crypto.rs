//! Envelope encryption for stored Square access tokens (AES-256-GCM)
//!
//! Format: base64(nonce_12bytes || ciphertext || tag_16bytes)

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use zeroize::Zeroize;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Token encryption key (32 bytes)
#[derive(Clone)]
pub struct MasterKey {
    key: [u8; KEY_LEN],
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

impl MasterKey {
    /// Decode a base64-encoded 32-byte key (env: TOKEN_ENCRYPTION_KEY)
    pub fn from_base64(encoded: &str) -> Result<Self, BoxError> {
        let mut bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
        if bytes.len() != KEY_LEN {
            let len = bytes.len();
            bytes.zeroize();
            return Err(format!("Token encryption key wrong length: {len} (expected {KEY_LEN})").into());
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self { key })
    }

    /// Random key for development runs without a configured key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut key);
        Self { key }
    }

    /// Encrypt plaintext → base64(nonce || ciphertext || tag)
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, &'static str> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| "Invalid key")?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| "Encryption failed")?;

        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&result))
    }

    /// Decrypt base64(nonce || ciphertext || tag) → plaintext
    pub fn decrypt(&self, encrypted_b64: &str) -> Result<Vec<u8>, &'static str> {
        let data = base64::engine::general_purpose::STANDARD
            .decode(encrypted_b64)
            .map_err(|_| "Invalid base64")?;

        if data.len() < NONCE_LEN + TAG_LEN {
            return Err("Ciphertext too short");
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| "Invalid key")?;
        let nonce = Nonce::from_slice(&data[..NONCE_LEN]);

        cipher
            .decrypt(nonce, &data[NONCE_LEN..])
            .map_err(|_| "Decryption failed (wrong key or tampered data)")
    }

    /// Decrypt a stored access token
    pub fn decrypt_string(&self, encrypted_b64: &str) -> Result<String, &'static str> {
        let bytes = self.decrypt(encrypted_b64)?;
        String::from_utf8(bytes).map_err(|_| "Decrypted data is not valid UTF-8")
    }
}
