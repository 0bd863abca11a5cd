//! Persistence layer: local key/value storage for the session credential
//! and user preferences.
//!
//! Provides the [`KeyValueStore`] trait with an in-process and a JSON file
//! implementation, and [`SessionStore`] for typed access to the fixed keys.

pub mod session_store;
pub mod store;

pub use session_store::{DISPLAY_NAME_KEY, REFRESH_TOKEN_KEY, SORT_TYPE_KEY, SessionStore};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
