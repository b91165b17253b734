//! Data models for the personal-finance API.
//!
//! This module contains the serde structures exchanged with the REST API:
//!
//! - `ApiEnvelope`: the `{ "data": ... }` wrapper around every response
//! - Auth types: `TokenPair`, `RefreshedToken`, `User`
//! - `Transaction` and its AI-parsing status types
//! - `Budget`, `Category`, `Summary`

pub mod auth;
pub mod budget;
pub mod category;
pub mod envelope;
pub mod summary;
pub mod transaction;

pub use auth::{LoginResponse, MessageResponse, RefreshedToken, TokenPair, User};
pub use budget::{Budget, BudgetPeriod, NewBudget};
pub use category::Category;
pub use envelope::{ApiEnvelope, ErrorBody};
pub use summary::{Summary, SummaryPeriod};
pub use transaction::{
    ExpenseText, NewTransaction, Transaction, TransactionKind, TransactionPage, TransactionQuery,
    TransactionStatus, TransactionStatusResponse,
};
