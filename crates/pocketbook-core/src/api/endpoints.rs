//! Typed wrappers for the finance API endpoints.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::models::auth::{
    ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
};
use crate::models::{
    Budget, Category, ExpenseText, LoginResponse, MessageResponse, NewBudget, NewTransaction,
    Summary, SummaryPeriod, Transaction, TransactionPage, TransactionQuery,
    TransactionStatusResponse, User,
};

use super::client::{ApiClient, SessionEvent};
use super::{ApiError, ApiRequest};

/// Default delay between transaction status polls
const STATUS_POLL_INTERVAL_MS: u64 = 2000;

/// Default number of polls before giving up on a pending transaction.
/// AI parsing usually settles within a few seconds.
const STATUS_POLL_MAX_ATTEMPTS: u32 = 30;

/// How to poll a transaction that is still being parsed
#[derive(Debug, Clone, Copy)]
pub struct StatusPoll {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for StatusPoll {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(STATUS_POLL_INTERVAL_MS),
            max_attempts: STATUS_POLL_MAX_ATTEMPTS,
        }
    }
}

impl ApiClient {
    // ===== Authentication =====

    /// Log in and store the issued token pair
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<User>, ApiError> {
        let request = ApiRequest::post("/auth/login")
            .json(&LoginRequest { email, password })?
            .public();
        let response: LoginResponse = self.execute(&request).await?;

        self.session()
            .set_tokens(&response.tokens.access_token, &response.tokens.refresh_token)?;
        info!("Logged in");
        self.notify(SessionEvent::LoggedIn);
        Ok(response.user)
    }

    /// Create a new account. Does not log in.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<MessageResponse, ApiError> {
        let request = ApiRequest::post("/auth/register")
            .json(&RegisterRequest { name, email, password })?
            .public();
        self.execute(&request).await
    }

    /// Log out on the server and forget the local credentials.
    ///
    /// The local session is cleared even when the server call fails. An
    /// expired access token is not refreshed just to be revoked.
    pub async fn logout(&self) -> Result<(), ApiError> {
        if self.is_authenticated() {
            let request = ApiRequest::post("/auth/logout").without_refresh();
            if let Err(e) = self.execute_unit(&request).await {
                warn!(error = %e, "Server logout failed, clearing local session anyway");
            }
        }
        self.session().clear()?;
        info!("Logged out");
        self.notify(SessionEvent::LoggedOut);
        Ok(())
    }

    /// Request a password reset email
    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ApiError> {
        let request = ApiRequest::post("/auth/forgot-password")
            .json(&ForgotPasswordRequest { email })?
            .public();
        self.execute(&request).await
    }

    /// Set a new password using the token from the reset email
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<MessageResponse, ApiError> {
        let request = ApiRequest::post("/auth/reset-password")
            .json(&ResetPasswordRequest { token, new_password })?
            .public();
        self.execute(&request).await
    }

    /// Fetch the logged-in user
    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.get("/auth/me").await
    }

    // ===== Transactions =====

    /// Fetch one page of transactions
    pub async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<TransactionPage, ApiError> {
        let request = ApiRequest::get("/transactions").query(query.to_pairs());
        self.execute(&request).await
    }

    /// Create a manually entered transaction
    pub async fn create_transaction(
        &self,
        transaction: &NewTransaction,
    ) -> Result<Transaction, ApiError> {
        self.post("/transactions", transaction).await
    }

    /// Submit free text for AI parsing. The returned transaction is usually
    /// still pending; poll it with `transaction_status` or `wait_for_transaction`.
    pub async fn parse_expense(&self, text: &str) -> Result<Transaction, ApiError> {
        let body = ExpenseText {
            text: text.to_string(),
        };
        self.post("/transactions/parse", &body).await
    }

    /// Fetch the parsing status of a transaction
    pub async fn transaction_status(&self, id: i64) -> Result<TransactionStatusResponse, ApiError> {
        self.get(&format!("/transactions/{}/status", id)).await
    }

    /// Poll a transaction until it reaches a terminal status or the poll
    /// budget runs out. Returns the last status seen either way.
    pub async fn wait_for_transaction(
        &self,
        id: i64,
        poll: StatusPoll,
    ) -> Result<TransactionStatusResponse, ApiError> {
        let mut attempts = 0;
        loop {
            let status = self.transaction_status(id).await?;
            attempts += 1;
            if status.status.is_terminal() || attempts >= poll.max_attempts {
                debug!(
                    id,
                    status = status.status.as_str(),
                    attempts,
                    "Finished polling transaction"
                );
                return Ok(status);
            }
            tokio::time::sleep(poll.interval).await;
        }
    }

    /// Delete a transaction
    pub async fn delete_transaction(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/transactions/{}", id)).await
    }

    // ===== Budgets =====

    pub async fn list_budgets(&self) -> Result<Vec<Budget>, ApiError> {
        self.get("/budgets").await
    }

    pub async fn create_budget(&self, budget: &NewBudget) -> Result<Budget, ApiError> {
        self.post("/budgets", budget).await
    }

    pub async fn delete_budget(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/budgets/{}", id)).await
    }

    // ===== Categories =====

    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.get("/categories").await
    }

    // ===== Summaries =====

    /// Fetch the AI-generated spending summary for a period
    pub async fn summary(&self, period: SummaryPeriod) -> Result<Summary, ApiError> {
        let request = ApiRequest::get("/summaries")
            .query([("period".to_string(), period.as_str().to_string())]);
        self.execute(&request).await
    }
}
