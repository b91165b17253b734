//! Authentication state for the API client.
//!
//! This module provides:
//! - `Session`: the token pair, read and written only through this type
//! - `Storage`: where the tokens live (file, OS keychain, or memory)
//!
//! Tokens are created at login, replaced at refresh, and deleted at logout
//! or when a refresh fails.

pub mod session;
pub mod storage;

pub use session::Session;
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, Storage, StorageError};
