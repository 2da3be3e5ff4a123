//! Authenticated encryption for API keys at rest.
//!
//! # Responsibility
//! - Derive a 256-bit key from the host secret (scrypt, constant salt).
//! - Seal/open strings with AES-256-GCM and a fresh random nonce per call.
//!
//! # Invariants
//! - Sealed ciphertext is `base64(ct) + "." + base64(tag)`; `.` never occurs
//!   in the standard base64 alphabet.
//! - Any tampering with ciphertext, tag or iv fails verification; a modified
//!   input never decrypts to a different plaintext.

use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, Nonce, OsRng, Tag};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KDF_SALT: &[u8] = b"salt";
const KDF_LOG_N: u8 = 14;
const KDF_R: u32 = 8;
const KDF_P: u32 = 1;
const PART_SEPARATOR: char = '.';

/// Ciphertext/iv pair produced by [`SecretCipher::encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSecret {
    /// `base64(ciphertext) + "." + base64(auth tag)`.
    pub ciphertext: String,
    /// Base64 nonce.
    pub iv: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// scrypt rejected its parameters or output length.
    KeyDerivation(String),
    /// Encryption backend failure; not reachable for in-memory buffers.
    Encryption,
    /// Packing, base64 or length violation in ciphertext or iv.
    Format(&'static str),
    /// Tag verification failed: tampered data, wrong key or wrong iv.
    Authenticity,
}

impl Display for CipherError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyDerivation(message) => write!(f, "key derivation failed: {message}"),
            Self::Encryption => write!(f, "encryption failed"),
            Self::Format(detail) => write!(f, "invalid encrypted data format: {detail}"),
            Self::Authenticity => write!(f, "encrypted data failed authentication"),
        }
    }
}

impl Error for CipherError {}

/// AES-256-GCM cipher keyed from the host secret.
///
/// The key is derived once on construction.
#[derive(Clone)]
pub struct SecretCipher {
    aead: Aes256Gcm,
}

impl Debug for SecretCipher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretCipher { .. }")
    }
}

impl SecretCipher {
    /// Derives the vault key from `secret`.
    ///
    /// Intentionally slow (scrypt N=2^14, r=8, p=1).
    pub fn derive(secret: &str) -> Result<Self, CipherError> {
        let params = scrypt::Params::new(KDF_LOG_N, KDF_R, KDF_P, KEY_LEN)
            .map_err(|err| CipherError::KeyDerivation(err.to_string()))?;
        let mut key = [0u8; KEY_LEN];
        scrypt::scrypt(secret.as_bytes(), KDF_SALT, &params, &mut key)
            .map_err(|err| CipherError::KeyDerivation(err.to_string()))?;
        let aead = Aes256Gcm::new_from_slice(&key)
            .map_err(|err| CipherError::KeyDerivation(err.to_string()));
        key.fill(0);
        Ok(Self { aead: aead? })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<SealedSecret, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .aead
            .encrypt_in_place_detached(&nonce, b"", &mut buffer)
            .map_err(|_| CipherError::Encryption)?;

        Ok(SealedSecret {
            ciphertext: format!(
                "{}{PART_SEPARATOR}{}",
                BASE64.encode(&buffer),
                BASE64.encode(tag)
            ),
            iv: BASE64.encode(nonce),
        })
    }

    pub fn decrypt(&self, ciphertext: &str, iv: &str) -> Result<String, CipherError> {
        let parts = ciphertext.split(PART_SEPARATOR).collect::<Vec<_>>();
        let [body, tag] = parts.as_slice() else {
            return Err(CipherError::Format("expected exactly two `.`-separated parts"));
        };

        let mut buffer = BASE64
            .decode(body)
            .map_err(|_| CipherError::Format("ciphertext is not base64"))?;
        let tag = BASE64
            .decode(tag)
            .map_err(|_| CipherError::Format("auth tag is not base64"))?;
        let nonce = BASE64
            .decode(iv)
            .map_err(|_| CipherError::Format("iv is not base64"))?;
        if tag.len() != TAG_LEN {
            return Err(CipherError::Format("auth tag has wrong length"));
        }
        if nonce.len() != NONCE_LEN {
            return Err(CipherError::Format("iv has wrong length"));
        }

        self.aead
            .decrypt_in_place_detached(
                Nonce::<Aes256Gcm>::from_slice(&nonce),
                b"",
                &mut buffer,
                Tag::<Aes256Gcm>::from_slice(&tag),
            )
            .map_err(|_| CipherError::Authenticity)?;

        String::from_utf8(buffer).map_err(|_| CipherError::Format("plaintext is not UTF-8"))
    }
}
