use std::fmt;
use std::sync::Arc;

use super::storage::{MemoryStorage, Storage, StorageError};

/// Storage key for the short-lived access token
const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the long-lived refresh token
const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Single source of truth for the current credentials.
///
/// Every read and write of the token pair goes through this type, so the
/// storage key names never leak into request code. Clone is cheap and all
/// clones observe the same storage.
#[derive(Clone)]
pub struct Session {
    storage: Arc<dyn Storage>,
}

impl Session {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Session that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Get the access token, if one is stored
    pub fn access_token(&self) -> Result<Option<String>, StorageError> {
        self.read(ACCESS_TOKEN_KEY)
    }

    /// Get the refresh token, if one is stored
    pub fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Store a freshly issued token pair (login)
    pub fn set_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), StorageError> {
        self.storage.set(ACCESS_TOKEN_KEY, access_token)?;
        self.storage.set(REFRESH_TOKEN_KEY, refresh_token)
    }

    /// Replace only the access token (refresh)
    pub fn set_access_token(&self, access_token: &str) -> Result<(), StorageError> {
        self.storage.set(ACCESS_TOKEN_KEY, access_token)
    }

    /// Remove both tokens. Both removals are attempted even if the first fails.
    pub fn clear(&self) -> Result<(), StorageError> {
        let access = self.storage.remove(ACCESS_TOKEN_KEY);
        let refresh = self.storage.remove(REFRESH_TOKEN_KEY);
        access.and(refresh)
    }

    /// Check if an access token is stored
    pub fn is_authenticated(&self) -> bool {
        matches!(self.access_token(), Ok(Some(_)))
    }

    // Empty values count as absent
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.storage.get(key)?.filter(|token| !token.is_empty()))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_tokens_and_read_back() {
        let session = Session::in_memory();
        assert!(!session.is_authenticated());

        session.set_tokens("A1", "R1").unwrap();
        assert_eq!(session.access_token().unwrap().as_deref(), Some("A1"));
        assert_eq!(session.refresh_token().unwrap().as_deref(), Some("R1"));
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_set_access_token_keeps_refresh_token() {
        let session = Session::in_memory();
        session.set_tokens("A1", "R1").unwrap();

        session.set_access_token("A2").unwrap();
        assert_eq!(session.access_token().unwrap().as_deref(), Some("A2"));
        assert_eq!(session.refresh_token().unwrap().as_deref(), Some("R1"));
    }

    #[test]
    fn test_clear_removes_both_tokens() {
        let session = Session::in_memory();
        session.set_tokens("A1", "R1").unwrap();

        session.clear().unwrap();
        assert_eq!(session.access_token().unwrap(), None);
        assert_eq!(session.refresh_token().unwrap(), None);
    }

    #[test]
    fn test_clear_and_login_recover_from_corrupt_session_file() {
        use crate::auth::FileStorage;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"access_token": "A1", trunc"#).unwrap();
        let session = Session::new(Arc::new(FileStorage::new(&path)));

        session.clear().unwrap();
        assert!(!path.exists());

        std::fs::write(&path, r#"{"access_token": "A1", trunc"#).unwrap();
        session.set_tokens("A2", "R2").unwrap();
        assert_eq!(session.access_token().unwrap().as_deref(), Some("A2"));
        assert_eq!(session.refresh_token().unwrap().as_deref(), Some("R2"));
    }

    #[test]
    fn test_clones_share_storage() {
        let session = Session::in_memory();
        let other = session.clone();

        session.set_tokens("A1", "R1").unwrap();
        assert_eq!(other.access_token().unwrap().as_deref(), Some("A1"));
    }

    #[test]
    fn test_empty_token_is_absent() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(ACCESS_TOKEN_KEY, "").unwrap();

        let session = Session::new(storage);
        assert_eq!(session.access_token().unwrap(), None);
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_debug_does_not_print_tokens() {
        let session = Session::in_memory();
        session.set_tokens("secret-access", "secret-refresh").unwrap();

        let rendered = format!("{:?}", session);
        assert!(!rendered.contains("secret"));
    }
}
