use crate::domain_model::*;
use crate::domain_port::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Credential store kept in a small JSON file, so a session outlives the
/// process the way browser storage outlives a page.
///
/// The file maps the fixed keys to their string values. Writes go to a temp
/// file that is then renamed over the original.
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

type Entries = BTreeMap<String, String>;

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<Entries, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(StoreError::Backend(e.to_string())),
        };
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            key: "file",
            reason: e.to_string(),
        })
    }

    async fn write(&self, entries: &Entries) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let payload =
            serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Backend(e.to_string()))?;
        let temp_path = self
            .path
            .with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&temp_path, payload)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn update(&self, f: impl FnOnce(&mut Entries) + Send) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read().await?;
        f(&mut entries);
        self.write(&entries).await
    }
}

#[async_trait::async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load_credentials(&self) -> Result<Option<CredentialPair>, StoreError> {
        let entries = self.read().await?;
        match (entries.get(ACCESS_TOKEN_KEY), entries.get(REFRESH_TOKEN_KEY)) {
            (Some(access), Some(refresh)) => Ok(Some(CredentialPair::new(
                access.clone(),
                refresh.clone(),
            ))),
            _ => Ok(None),
        }
    }

    async fn save_credentials(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let access = pair.access_token.expose().to_owned();
        let refresh = pair.refresh_token.expose().to_owned();
        self.update(|entries| {
            entries.insert(ACCESS_TOKEN_KEY.to_owned(), access);
            entries.insert(REFRESH_TOKEN_KEY.to_owned(), refresh);
        })
        .await
    }

    async fn load_principal(&self) -> Result<Option<Principal>, StoreError> {
        let entries = self.read().await?;
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
        self.update(|entries| {
            entries.insert(PRINCIPAL_KEY.to_owned(), raw);
        })
        .await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Backend(e.to_string())),
        }
    }
}
