//! API key vault over a flat credential store.
//!
//! # Responsibility
//! - Encrypt third-party API keys before they reach the credential store.
//! - Distinguish absent, corrupt and tampered secrets on retrieval.
//!
//! # Invariants
//! - A secret is written as one sealed record (one store write), so a crash
//!   cannot leave ciphertext without its iv.
//! - Legacy two-entry secrets (ciphertext entry + `-iv` entry) stay readable;
//!   a legacy ciphertext without its iv entry is `CorruptState`.
//! - `exists` never returns an error.
//! - Plaintext keys are never logged.

use crate::vault::cipher::{CipherError, SealedSecret, SecretCipher};
use crate::vault::credential_store::{CredentialStore, CredentialStoreError};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Credential store namespace holding sealed records.
pub const VAULT_NAMESPACE: &str = "AI-Character-Council";
/// Suffix of the legacy namespace that held ivs separately.
pub const IV_NAMESPACE_SUFFIX: &str = "-iv";

const SEALED_RECORD_VERSION: u32 = 1;

static SERVICE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,64}$").expect("valid service id regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// Service identifier is empty or has unsupported characters.
    InvalidService(String),
    KeyDerivation(String),
    Encryption,
    /// Stored value could not be unpacked.
    Format,
    /// Stored value failed authentication (tampered, or secret changed).
    Authenticity,
    /// Ciphertext present without its iv.
    CorruptState { service: String },
    Storage(CredentialStoreError),
}

impl Display for VaultError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidService(service) => write!(
                f,
                "invalid service `{service}`; expected 1-64 of [A-Za-z0-9._-]"
            ),
            Self::KeyDerivation(message) => write!(f, "vault key derivation failed: {message}"),
            Self::Encryption => write!(f, "failed to encrypt API key"),
            // Same text on purpose: callers must not tell tampering from corruption.
            Self::Format | Self::Authenticity => write!(f, "failed to decrypt API key"),
            Self::CorruptState { service } => write!(
                f,
                "stored API key for `{service}` is corrupt: initialization vector not found"
            ),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VaultError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CipherError> for VaultError {
    fn from(value: CipherError) -> Self {
        match value {
            CipherError::KeyDerivation(message) => Self::KeyDerivation(message),
            CipherError::Encryption => Self::Encryption,
            CipherError::Format(_) => Self::Format,
            CipherError::Authenticity => Self::Authenticity,
        }
    }
}

impl From<CredentialStoreError> for VaultError {
    fn from(value: CredentialStoreError) -> Self {
        Self::Storage(value)
    }
}

/// On-store shape of one secret.
#[derive(Debug, Serialize, Deserialize)]
struct SealedRecord {
    version: u32,
    #[serde(default)]
    iv: Option<String>,
    ciphertext: String,
}

enum StoredSecret {
    Record(SealedRecord),
    Legacy(String),
}

/// Encrypting API key vault.
///
/// Built once at host start and handed to the dispatcher.
pub struct Vault<S: CredentialStore> {
    store: S,
    cipher: SecretCipher,
    namespace: String,
    iv_namespace: String,
}

impl<S: CredentialStore> Vault<S> {
    /// Derives the vault key from `app_secret` and binds the store.
    pub fn new(store: S, app_secret: &SecretString) -> Result<Self, VaultError> {
        let cipher = SecretCipher::derive(app_secret.expose_secret())?;
        Ok(Self::with_cipher(store, cipher))
    }

    /// Binds an already derived cipher; avoids repeating the KDF.
    pub fn with_cipher(store: S, cipher: SecretCipher) -> Self {
        Self {
            store,
            cipher,
            namespace: VAULT_NAMESPACE.to_string(),
            iv_namespace: format!("{VAULT_NAMESPACE}{IV_NAMESPACE_SUFFIX}"),
        }
    }

    /// Overrides the application namespace (and the derived iv namespace).
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self.iv_namespace = format!("{}{IV_NAMESPACE_SUFFIX}", self.namespace);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn iv_namespace(&self) -> &str {
        &self.iv_namespace
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<SealedSecret, VaultError> {
        Ok(self.cipher.encrypt(plaintext)?)
    }

    pub fn decrypt(&self, ciphertext: &str, iv: &str) -> Result<String, VaultError> {
        Ok(self.cipher.decrypt(ciphertext, iv)?)
    }

    /// Encrypts and stores `plaintext`, replacing any previous key.
    pub fn store(&self, service: &str, plaintext: &str) -> Result<(), VaultError> {
        validate_service(service)?;
        let sealed = self.cipher.encrypt(plaintext)?;
        let record = SealedRecord {
            version: SEALED_RECORD_VERSION,
            iv: Some(sealed.iv),
            ciphertext: sealed.ciphertext,
        };
        let encoded = serde_json::to_string(&record).map_err(|_| VaultError::Encryption)?;

        if let Err(err) = self.store.set(&self.namespace, service, &encoded) {
            warn!("event=vault_store module=vault status=error service={service} error={err}");
            return Err(err.into());
        }

        // The record carries its own iv; a leftover legacy iv entry is unused.
        if let Err(err) = self.store.delete(&self.iv_namespace, service) {
            warn!(
                "event=vault_legacy_iv_cleanup module=vault status=error service={service} error={err}"
            );
        }

        info!("event=vault_store module=vault status=ok service={service}");
        Ok(())
    }

    /// Returns the decrypted key, or `None` when no key is configured.
    ///
    /// # Errors
    /// - `CorruptState` when ciphertext exists without an iv.
    /// - `Format`/`Authenticity` when the stored value does not decrypt.
    /// - `Storage` when the credential store fails.
    pub fn retrieve(&self, service: &str) -> Result<Option<String>, VaultError> {
        validate_service(service)?;
        let Some(raw) = self.store.get(&self.namespace, service)? else {
            return Ok(None);
        };

        let (ciphertext, iv) = match parse_stored(&raw)? {
            StoredSecret::Record(record) => match record.iv.filter(|iv| !iv.is_empty()) {
                Some(iv) => (record.ciphertext, iv),
                None => return Err(self.corrupt(service)),
            },
            StoredSecret::Legacy(ciphertext) => {
                match self.store.get(&self.iv_namespace, service)? {
                    Some(iv) if !iv.is_empty() => (ciphertext, iv),
                    _ => return Err(self.corrupt(service)),
                }
            }
        };

        match self.cipher.decrypt(&ciphertext, &iv) {
            Ok(plaintext) => Ok(Some(plaintext)),
            Err(err) => {
                warn!("event=vault_retrieve module=vault status=error service={service} error={err}");
                Err(err.into())
            }
        }
    }

    /// Deletes the key; already absent is success.
    pub fn remove(&self, service: &str) -> Result<(), VaultError> {
        validate_service(service)?;
        let removed = self.store.delete(&self.namespace, service)?;
        let removed_iv = self.store.delete(&self.iv_namespace, service)?;
        info!(
            "event=vault_remove module=vault status=ok service={service} existed={}",
            removed || removed_iv
        );
        Ok(())
    }

    /// Advisory check: true only when `retrieve` would yield a key.
    pub fn exists(&self, service: &str) -> bool {
        match self.retrieve(service) {
            Ok(found) => found.is_some(),
            Err(err) => {
                warn!("event=vault_exists module=vault status=error service={service} error={err}");
                false
            }
        }
    }

    fn corrupt(&self, service: &str) -> VaultError {
        warn!("event=vault_retrieve module=vault status=error service={service} error_code=iv_missing");
        VaultError::CorruptState {
            service: service.to_string(),
        }
    }
}

fn validate_service(service: &str) -> Result<(), VaultError> {
    if SERVICE_ID_RE.is_match(service) {
        Ok(())
    } else {
        Err(VaultError::InvalidService(service.to_string()))
    }
}

/// Returns whether `service` is acceptable as a vault identifier.
pub fn is_valid_service(service: &str) -> bool {
    SERVICE_ID_RE.is_match(service)
}

fn parse_stored(raw: &str) -> Result<StoredSecret, VaultError> {
    if !raw.trim_start().starts_with('{') {
        return Ok(StoredSecret::Legacy(raw.to_string()));
    }
    let record: SealedRecord = serde_json::from_str(raw).map_err(|_| VaultError::Format)?;
    if record.version != SEALED_RECORD_VERSION {
        return Err(VaultError::Format);
    }
    Ok(StoredSecret::Record(record))
}

#[cfg(test)]
mod tests {
    use super::{is_valid_service, VaultError};
    use crate::vault::cipher::CipherError;

    #[test]
    fn service_ids_accept_provider_names_only() {
        assert!(is_valid_service("openai"));
        assert!(is_valid_service("azure-openai.eu_1"));
        assert!(!is_valid_service(""));
        assert!(!is_valid_service("open ai"));
        assert!(!is_valid_service(&"x".repeat(65)));
    }

    #[test]
    fn decrypt_failures_share_one_message() {
        let format = VaultError::from(CipherError::Format("expected exactly two parts"));
        let auth = VaultError::from(CipherError::Authenticity);
        assert_eq!(format, VaultError::Format);
        assert_eq!(format.to_string(), auth.to_string());
        assert_eq!(auth.to_string(), "failed to decrypt API key");
    }
}
