//! Pocketbook core - the client side of a personal-finance app.
//!
//! This crate provides the authenticated API client, the session that owns
//! the access/refresh token pair, typed models for transactions, budgets,
//! categories and AI summaries, and the application configuration.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, ApiRequest, AuthError, SessionEvent, StatusPoll};
pub use auth::{FileStorage, KeyringStorage, MemoryStorage, Session, Storage, StorageError};
pub use config::{Config, StorageBackend};
