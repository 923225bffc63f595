use crate::domain_model::*;
use crate::domain_port::*;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Process-local credential store keeping the same three keys a persistent
/// backend would.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<&'static str, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(pair: &CredentialPair) -> Self {
        let store = Self::new();
        {
            let mut entries = store.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.insert(ACCESS_TOKEN_KEY, pair.access_token.expose().to_owned());
            entries.insert(REFRESH_TOKEN_KEY, pair.refresh_token.expose().to_owned());
        }
        store
    }

    /// Raw value under one of the fixed keys.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load_credentials(&self) -> Result<Option<CredentialPair>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match (entries.get(ACCESS_TOKEN_KEY), entries.get(REFRESH_TOKEN_KEY)) {
            (Some(access), Some(refresh)) => Ok(Some(CredentialPair::new(
                access.clone(),
                refresh.clone(),
            ))),
            _ => Ok(None),
        }
    }

    async fn save_credentials(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(ACCESS_TOKEN_KEY, pair.access_token.expose().to_owned());
        entries.insert(REFRESH_TOKEN_KEY, pair.refresh_token.expose().to_owned());
        Ok(())
    }

    async fn load_principal(&self) -> Result<Option<Principal>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(PRINCIPAL_KEY)
            .map(|raw| {
                serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
                    key: PRINCIPAL_KEY,
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    async fn save_principal(&self, principal: &Principal) -> Result<(), StoreError> {
        let raw = serde_json::to_string(principal).map_err(|e| StoreError::Corrupt {
            key: PRINCIPAL_KEY,
            reason: e.to_string(),
        })?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(PRINCIPAL_KEY, raw);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}
