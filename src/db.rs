use std::{io, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    // plaintext, compared by equality
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// What other users may see about an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicProfile {
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub birthdate: Option<String>,
    pub address: Option<String>,
}

impl From<&Account> for PublicProfile {
    fn from(account: &Account) -> Self {
        Self {
            username: account.username.clone(),
            full_name: account.full_name.clone(),
            email: account.email.clone(),
            birthdate: account.birthdate.clone(),
            address: account.address.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot access {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed account document {}: {source}", path.display())]
    Decode { path: PathBuf, source: serde_json::Error },
    #[error("cannot encode account document {}: {source}", path.display())]
    Encode { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountDocument {
    #[serde(default)]
    users: Vec<Account>,
}

/// The registered-user list, mirrored in memory and persisted as one JSON document.
///
/// Callers serialize access; the store itself has no locking.
#[derive(Debug)]
pub struct AccountStore {
    path: PathBuf,
    accounts: Vec<Account>,
}

impl AccountStore {
    /// Loads the document at `path`. A missing file is an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let accounts = match fs::read(&path).await {
            Ok(bytes) => {
                let document: AccountDocument = serde_json::from_slice(&bytes)
                    .map_err(|source| StoreError::Decode { path: path.clone(), source })?;
                document.users
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        Ok(Self { path, accounts })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn find(&self, username: &str) -> Option<&Account> {
        self.accounts.iter().find(|account| account.username == username)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.find(username).is_some()
    }

    /// Writes the whole list to a sibling temp file and renames it over the document.
    pub async fn save(&self) -> Result<(), StoreError> {
        let io_err = |source: io::Error| StoreError::Io { path: self.path.clone(), source };

        let json = serde_json::to_vec_pretty(&AccountDocument { users: self.accounts.clone() })
            .map_err(|source| StoreError::Encode { path: self.path.clone(), source })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, json).await.map_err(io_err)?;
        fs::rename(&temp_path, &self.path).await.map_err(io_err)?;

        Ok(())
    }

    /// Appends and persists. Uniqueness is the caller's job.
    /// On a failed save the in-memory list is left as it was.
    pub async fn append(&mut self, account: Account) -> Result<(), StoreError> {
        self.accounts.push(account);
        if let Err(err) = self.save().await {
            self.accounts.pop();
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(username: &str) -> Account {
        Account {
            username: username.to_owned(),
            password: "pw".to_owned(),
            full_name: format!("{username} Example"),
            email: None,
            birthdate: None,
            address: Some("Somewhere".to_owned()),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::load(dir.path().join("nope.json")).await.unwrap();
        assert!(store.accounts().is_empty());
    }

    #[tokio::test]
    async fn append_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("accounts.json");

        let mut store = AccountStore::load(&path).await.unwrap();
        store.append(account("alice")).await.unwrap();
        store.append(account("bob")).await.unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let reloaded = AccountStore::load(&path).await.unwrap();
        assert_eq!(reloaded.accounts(), store.accounts());
        assert_eq!(reloaded.find("bob").unwrap().address.as_deref(), Some("Somewhere"));
    }

    #[tokio::test]
    async fn malformed_document_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = AccountStore::load(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[test]
    fn encode_errors_do_not_blame_the_document() {
        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let err = StoreError::Encode { path: PathBuf::from("accounts.json"), source };
        assert!(err.to_string().starts_with("cannot encode account document accounts.json"));
    }

    #[tokio::test]
    async fn failed_save_rolls_back_append() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the document should be makes the rename fail
        let path = dir.path().join("accounts.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let mut store = AccountStore { path, accounts: Vec::new() };
        let err = store.append(account("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(!store.contains("alice"));
    }
}
