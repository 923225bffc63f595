use crate::domain_model::*;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Credential store persisted in Redis so a session survives restarts.
pub struct RedisCredentialStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisCredentialStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisCredentialStore {
            conn,
            prefix: prefix.into(),
        }
    }

    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(backend)?;
        let conn = client.get_connection_manager().await.map_err(backend)?;
        Ok(Self::new(conn, prefix))
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.prefix, name)
    }
}

fn backend(error: redis::RedisError) -> StoreError {
    StoreError::Backend(error.to_string())
}

#[async_trait::async_trait]
impl CredentialStore for RedisCredentialStore {
    async fn load_credentials(&self) -> Result<Option<CredentialPair>, StoreError> {
        let keys = [self.key(ACCESS_TOKEN_KEY), self.key(REFRESH_TOKEN_KEY)];
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = conn.mget(&keys[..]).await.map_err(backend)?;
        match values.as_slice() {
            [Some(access), Some(refresh)] => Ok(Some(CredentialPair::new(
                access.clone(),
                refresh.clone(),
            ))),
            _ => Ok(None),
        }
    }

    async fn save_credentials(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .set(self.key(ACCESS_TOKEN_KEY), pair.access_token.expose())
            .ignore()
            .set(self.key(REFRESH_TOKEN_KEY), pair.refresh_token.expose())
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn load_principal(&self) -> Result<Option<Principal>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.key(PRINCIPAL_KEY)).await.map_err(backend)?;
        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
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
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(self.key(PRINCIPAL_KEY), raw)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let keys = [
            self.key(ACCESS_TOKEN_KEY),
            self.key(REFRESH_TOKEN_KEY),
            self.key(PRINCIPAL_KEY),
        ];
        let mut conn = self.conn.clone();
        let _: () = conn.del(&keys[..]).await.map_err(backend)?;
        Ok(())
    }
}
