use crate::session::dto::UserProfile;
use crate::storage::entity::local_store::{
    self, ActiveModel as LocalStoreActiveModel, Entity as LocalStore,
};
use crate::storage::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const KEY_ACCESS_TOKEN: &str = "access_token";
pub const KEY_TOKEN_TYPE: &str = "token_type";
pub const KEY_TOKEN_EXPIRES_AT: &str = "token_expires_at";
pub const KEY_USER: &str = "user";

/// 401 时整体清除的全部键
pub const CREDENTIAL_KEYS: [&str; 4] = [
    KEY_ACCESS_TOKEN,
    KEY_TOKEN_TYPE,
    KEY_TOKEN_EXPIRES_AT,
    KEY_USER,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub user: Option<UserProfile>,
}

impl StoredCredentials {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<StoredCredentials>, StorageError>;
    async fn save(&self, creds: &StoredCredentials) -> Result<(), StorageError>;
    async fn save_user(&self, user: &UserProfile) -> Result<(), StorageError>;
    async fn clear(&self) -> Result<(), StorageError>;
}

pub struct LocalStoreRepository;

impl LocalStoreRepository {
    pub async fn get(db: &DatabaseConnection, key: &str) -> Result<Option<String>, sea_orm::DbErr> {
        Ok(LocalStore::find_by_id(key.to_string())
            .one(db)
            .await?
            .map(|m| m.value))
    }

    pub async fn set(db: &DatabaseConnection, key: &str, value: String) -> Result<(), sea_orm::DbErr> {
        let now = Utc::now().timestamp();
        let active_model = LocalStoreActiveModel {
            key: Set(key.to_string()),
            value: Set(value),
            updated_at: Set(now),
        };
        LocalStore::insert(active_model)
            .on_conflict(
                OnConflict::column(local_store::Column::Key)
                    .update_columns([local_store::Column::Value, local_store::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn remove_many(db: &DatabaseConnection, keys: &[&str]) -> Result<u64, sea_orm::DbErr> {
        let res = LocalStore::delete_many()
            .filter(local_store::Column::Key.is_in(keys.iter().copied()))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }
}

/// SQLite 持久化的凭证存储
pub struct SqliteCredentialStore {
    db: Arc<DatabaseConnection>,
}

impl SqliteCredentialStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn load(&self) -> Result<Option<StoredCredentials>, StorageError> {
        let db = self.db.as_ref();
        let Some(access_token) = LocalStoreRepository::get(db, KEY_ACCESS_TOKEN).await? else {
            return Ok(None);
        };
        let token_type = LocalStoreRepository::get(db, KEY_TOKEN_TYPE)
            .await?
            .unwrap_or_else(|| "bearer".to_string());
        let expires_at = LocalStoreRepository::get(db, KEY_TOKEN_EXPIRES_AT)
            .await?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let user = match LocalStoreRepository::get(db, KEY_USER).await? {
            Some(raw) => serde_json::from_str(&raw).ok(),
            None => None,
        };

        Ok(Some(StoredCredentials {
            access_token,
            token_type,
            expires_at,
            user,
        }))
    }

    async fn save(&self, creds: &StoredCredentials) -> Result<(), StorageError> {
        let db = self.db.as_ref();
        LocalStoreRepository::set(db, KEY_ACCESS_TOKEN, creds.access_token.clone()).await?;
        LocalStoreRepository::set(db, KEY_TOKEN_TYPE, creds.token_type.clone()).await?;
        match creds.expires_at {
            Some(exp) => {
                LocalStoreRepository::set(db, KEY_TOKEN_EXPIRES_AT, exp.to_rfc3339()).await?
            }
            None => {
                LocalStoreRepository::remove_many(db, &[KEY_TOKEN_EXPIRES_AT]).await?;
            }
        }
        match creds.user {
            Some(ref user) => self.save_user(user).await?,
            None => {
                LocalStoreRepository::remove_many(db, &[KEY_USER]).await?;
            }
        }
        Ok(())
    }

    async fn save_user(&self, user: &UserProfile) -> Result<(), StorageError> {
        let raw = serde_json::to_string(user)?;
        LocalStoreRepository::set(self.db.as_ref(), KEY_USER, raw).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        LocalStoreRepository::remove_many(self.db.as_ref(), &CREDENTIAL_KEYS).await?;
        Ok(())
    }
}

/// 内存凭证存储（不落盘）
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Option<StoredCredentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with(creds: StoredCredentials) -> Self {
        Self {
            inner: RwLock::new(Some(creds)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<StoredCredentials>, StorageError> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, creds: &StoredCredentials) -> Result<(), StorageError> {
        *self.inner.write().await = Some(creds.clone());
        Ok(())
    }

    async fn save_user(&self, user: &UserProfile) -> Result<(), StorageError> {
        if let Some(ref mut creds) = *self.inner.write().await {
            creds.user = Some(user.clone());
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.inner.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::establish_connection;
    use chrono::{Duration, TimeZone};

    fn sample() -> StoredCredentials {
        StoredCredentials {
            access_token: "tok-123".to_string(),
            token_type: "bearer".to_string(),
            expires_at: Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()),
            user: Some(UserProfile {
                id: Some("u-1".to_string()),
                email: "admin@example.com".to_string(),
                full_name: None,
                is_active: true,
                is_superuser: true,
            }),
        }
    }

    #[tokio::test]
    async fn sqlite_store_persists_and_clears_all_keys() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("local.db").display());
        let db = Arc::new(establish_connection(&url).await.unwrap());
        let store = SqliteCredentialStore::new(db.clone());

        assert!(store.load().await.unwrap().is_none());

        store.save(&sample()).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, sample());

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        for key in CREDENTIAL_KEYS {
            assert!(LocalStoreRepository::get(db.as_ref(), key)
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    async fn memory_store_save_user_requires_token() {
        let store = MemoryCredentialStore::new();
        let user = sample().user.unwrap();
        store.save_user(&user).await.unwrap();
        assert!(store.load().await.unwrap().is_none());

        let mut creds = sample();
        creds.user = None;
        store.save(&creds).await.unwrap();
        store.save_user(&user).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().user, Some(user));
    }

    #[test]
    fn expiry_check() {
        let creds = sample();
        let exp = creds.expires_at.unwrap();
        assert!(!creds.is_expired(exp - Duration::seconds(1)));
        assert!(creds.is_expired(exp));

        let mut open = sample();
        open.expires_at = None;
        assert!(!open.is_expired(Utc::now()));
    }
}
