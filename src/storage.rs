use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub(crate) const TOKEN_KEY: &str = "token";
pub(crate) const USER_KEY: &str = "user";
pub(crate) const MODIFIERS_KEY: &str = "srpg_modifiers";

#[derive(Error, Debug)]
pub(crate) enum StoreError {
    #[error("error accessing local store {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed local store data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Not logged in. Run `login` first.")]
    NotLoggedIn,
}

/// String key/value file shared by every command: the auth token, the user record and
/// the cached modifier table.
#[derive(Debug, Clone)]
pub(crate) struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, contents).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.into());
        self.write_all(&entries)
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }

    /// Token stored by a successful login. Every command but `login` and `logout` needs one.
    pub fn require_token(&self) -> Result<String, StoreError> {
        match self.get(TOKEN_KEY)? {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(StoreError::NotLoggedIn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("store.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_reads_empty() {
        let (_dir, store) = store();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        assert!(matches!(store.require_token(), Err(StoreError::NotLoggedIn)));
    }

    #[test]
    fn set_get_remove() {
        let (_dir, store) = store();
        store.set(TOKEN_KEY, "abc").unwrap();
        store.set(USER_KEY, r#"{"name":"ana"}"#).unwrap();
        assert_eq!(store.require_token().unwrap(), "abc");
        assert_eq!(
            store.get(USER_KEY).unwrap().as_deref(),
            Some(r#"{"name":"ana"}"#)
        );

        store.remove(TOKEN_KEY).unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        assert!(store.get(USER_KEY).unwrap().is_some());
    }

    #[test]
    fn empty_token_is_not_logged_in() {
        let (_dir, store) = store();
        store.set(TOKEN_KEY, "").unwrap();
        assert!(matches!(store.require_token(), Err(StoreError::NotLoggedIn)));
    }

    #[test]
    fn corrupted_file_is_an_error() {
        let (_dir, store) = store();
        std::fs::write(store.path(), "not json").unwrap();
        assert!(matches!(store.get(TOKEN_KEY), Err(StoreError::Json(_))));
    }
}
