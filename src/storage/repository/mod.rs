pub mod credential_repo;

pub use credential_repo::{
    CredentialStore, MemoryCredentialStore, SqliteCredentialStore, StoredCredentials,
};
