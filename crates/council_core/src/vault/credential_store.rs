//! Flat key/value credential storage seam.
//!
//! # Responsibility
//! - Abstract the OS credential store behind `(namespace, account) -> secret`.
//! - Provide a keyring-backed implementation and an in-process one.
//!
//! # Invariants
//! - Reading a missing entry is `Ok(None)`, never an error.
//! - Deleting a missing entry is `Ok(false)`, never an error.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStoreError {
    /// Backend rejected the operation.
    Backend(String),
    LockPoisoned,
}

impl Display for CredentialStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(message) => write!(f, "credential store error: {message}"),
            Self::LockPoisoned => write!(f, "credential store lock poisoned"),
        }
    }
}

impl Error for CredentialStoreError {}

/// Flat secret storage keyed by namespace and account.
pub trait CredentialStore: Send + Sync {
    fn get(&self, namespace: &str, account: &str) -> Result<Option<String>, CredentialStoreError>;
    fn set(&self, namespace: &str, account: &str, secret: &str)
        -> Result<(), CredentialStoreError>;
    /// Returns whether an entry existed.
    fn delete(&self, namespace: &str, account: &str) -> Result<bool, CredentialStoreError>;
}

impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    fn get(&self, namespace: &str, account: &str) -> Result<Option<String>, CredentialStoreError> {
        (**self).get(namespace, account)
    }

    fn set(
        &self,
        namespace: &str,
        account: &str,
        secret: &str,
    ) -> Result<(), CredentialStoreError> {
        (**self).set(namespace, account, secret)
    }

    fn delete(&self, namespace: &str, account: &str) -> Result<bool, CredentialStoreError> {
        (**self).delete(namespace, account)
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for Box<T> {
    fn get(&self, namespace: &str, account: &str) -> Result<Option<String>, CredentialStoreError> {
        (**self).get(namespace, account)
    }

    fn set(
        &self,
        namespace: &str,
        account: &str,
        secret: &str,
    ) -> Result<(), CredentialStoreError> {
        (**self).set(namespace, account, secret)
    }

    fn delete(&self, namespace: &str, account: &str) -> Result<bool, CredentialStoreError> {
        (**self).delete(namespace, account)
    }
}

/// OS keyring (Keychain, Credential Manager, kernel keyutils).
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringCredentialStore;

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self
    }

    fn entry(namespace: &str, account: &str) -> Result<keyring::Entry, CredentialStoreError> {
        keyring::Entry::new(namespace, account)
            .map_err(|err| CredentialStoreError::Backend(err.to_string()))
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self, namespace: &str, account: &str) -> Result<Option<String>, CredentialStoreError> {
        match Self::entry(namespace, account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(CredentialStoreError::Backend(err.to_string())),
        }
    }

    fn set(
        &self,
        namespace: &str,
        account: &str,
        secret: &str,
    ) -> Result<(), CredentialStoreError> {
        Self::entry(namespace, account)?
            .set_password(secret)
            .map_err(|err| CredentialStoreError::Backend(err.to_string()))
    }

    fn delete(&self, namespace: &str, account: &str) -> Result<bool, CredentialStoreError> {
        match Self::entry(namespace, account)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(err) => Err(CredentialStoreError::Backend(err.to_string())),
        }
    }
}

/// Process-local store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<BTreeMap<(String, String), String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries across all namespaces.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, namespace: &str, account: &str) -> Result<Option<String>, CredentialStoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| CredentialStoreError::LockPoisoned)?;
        Ok(entries
            .get(&(namespace.to_string(), account.to_string()))
            .cloned())
    }

    fn set(
        &self,
        namespace: &str,
        account: &str,
        secret: &str,
    ) -> Result<(), CredentialStoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CredentialStoreError::LockPoisoned)?;
        entries.insert(
            (namespace.to_string(), account.to_string()),
            secret.to_string(),
        );
        Ok(())
    }

    fn delete(&self, namespace: &str, account: &str) -> Result<bool, CredentialStoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CredentialStoreError::LockPoisoned)?;
        Ok(entries
            .remove(&(namespace.to_string(), account.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::{CredentialStore, MemoryCredentialStore};

    #[test]
    fn memory_store_separates_namespaces() {
        let store = MemoryCredentialStore::new();
        store.set("app", "openai", "cipher").expect("set");
        store.set("app-iv", "openai", "iv").expect("set");

        assert_eq!(store.get("app", "openai").expect("get").as_deref(), Some("cipher"));
        assert_eq!(store.get("app-iv", "openai").expect("get").as_deref(), Some("iv"));
        assert_eq!(store.get("app", "anthropic").expect("get"), None);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn memory_store_delete_reports_presence_and_is_idempotent() {
        let store = MemoryCredentialStore::new();
        store.set("app", "openai", "cipher").expect("set");

        assert!(store.delete("app", "openai").expect("first delete"));
        assert!(!store.delete("app", "openai").expect("second delete"));
        assert!(store.is_empty());
    }
}
