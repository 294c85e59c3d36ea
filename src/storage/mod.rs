pub mod connection;
pub mod entity;
pub mod repository;

pub use connection::establish_connection;
pub use repository::{
    CredentialStore, MemoryCredentialStore, SqliteCredentialStore, StoredCredentials,
};

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
