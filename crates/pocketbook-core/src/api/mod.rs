//! REST API client module for the finance backend.
//!
//! This module provides the `ApiClient` for communicating with the API that
//! serves transactions, budgets, categories and AI-generated summaries.
//!
//! The API uses bearer token authentication. Access tokens are short-lived;
//! the client renews them with the stored refresh token when a request is
//! rejected, then resends the request once.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod request;

pub use client::{ApiClient, SessionEvent, DEFAULT_LOGIN_PATH};
pub use endpoints::StatusPoll;
pub use error::{ApiError, AuthError};
pub use request::{ApiRequest, Attempt, AuthMode};
