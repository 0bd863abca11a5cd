//! Typed access to the persisted session keys.

use super::store::KeyValueStore;
use crate::error::MuxError;

/// Key holding the refresh token passed to `connect`.
pub const REFRESH_TOKEN_KEY: &str = "phx_refresh";
/// Key holding the user's display name.
pub const DISPLAY_NAME_KEY: &str = "user_display_name";
/// Key holding the preferred card sort order.
pub const SORT_TYPE_KEY: &str = "durak_sort_type";

/// Wraps a [`KeyValueStore`] with accessors for the fixed keys.
///
/// Blank values read back as absent.
#[derive(Debug, Clone)]
pub struct SessionStore<S> {
    store: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    /// Wraps `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Unwraps the underlying store.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.store
    }

    /// The stored refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Storage`] if the store cannot be read.
    pub fn refresh_token(&self) -> Result<Option<String>, MuxError> {
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Stores a new refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Storage`] if the store cannot be written.
    pub fn set_refresh_token(&mut self, token: &str) -> Result<(), MuxError> {
        self.store.set(REFRESH_TOKEN_KEY, token)
    }

    /// Forgets the refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Storage`] if the store cannot be written.
    pub fn clear_refresh_token(&mut self) -> Result<(), MuxError> {
        self.store.remove(REFRESH_TOKEN_KEY)
    }

    /// The stored display name.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Storage`] if the store cannot be read.
    pub fn display_name(&self) -> Result<Option<String>, MuxError> {
        self.read(DISPLAY_NAME_KEY)
    }

    /// Stores the display name.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Storage`] if the store cannot be written.
    pub fn set_display_name(&mut self, name: &str) -> Result<(), MuxError> {
        self.store.set(DISPLAY_NAME_KEY, name)
    }

    /// The stored sort order.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Storage`] if the store cannot be read.
    pub fn sort_type(&self) -> Result<Option<String>, MuxError> {
        self.read(SORT_TYPE_KEY)
    }

    /// Stores the sort order.
    ///
    /// # Errors
    ///
    /// Returns [`MuxError::Storage`] if the store cannot be written.
    pub fn set_sort_type(&mut self, sort_type: &str) -> Result<(), MuxError> {
        self.store.set(SORT_TYPE_KEY, sort_type)
    }

    fn read(&self, key: &str) -> Result<Option<String>, MuxError> {
        Ok(self
            .store
            .get(key)?
            .filter(|value| !value.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn refresh_token_round_trip() {
        let mut session = SessionStore::new(MemoryStore::new());
        assert_eq!(session.refresh_token(), Ok(None));
        assert!(session.set_refresh_token("tok").is_ok());
        assert_eq!(session.refresh_token(), Ok(Some("tok".to_string())));
        assert!(session.clear_refresh_token().is_ok());
        assert_eq!(session.refresh_token(), Ok(None));
    }

    #[test]
    fn preferences_use_fixed_keys() {
        let mut session = SessionStore::new(MemoryStore::new());
        assert!(session.set_display_name("Ana").is_ok());
        assert!(session.set_sort_type("suit").is_ok());
        let store = session.into_inner();
        assert_eq!(store.get("user_display_name"), Ok(Some("Ana".to_string())));
        assert_eq!(store.get("durak_sort_type"), Ok(Some("suit".to_string())));
    }

    #[test]
    fn blank_values_read_as_absent() {
        let mut session = SessionStore::new(MemoryStore::new());
        assert!(session.set_display_name("  ").is_ok());
        assert_eq!(session.display_name(), Ok(None));
    }
}
