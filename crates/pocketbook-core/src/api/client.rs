//! Authenticated HTTP client for the finance REST API.
//!
//! Every request goes through [`ApiClient::send`], which attaches the stored
//! access token and recovers from an expired token by calling the refresh
//! endpoint and resending the request once. Callers only see the outcome of
//! that retry, or a terminal error when the session cannot be recovered.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::config::Config;
use crate::models::{ApiEnvelope, RefreshedToken};

use super::request::{bearer, ApiRequest, Attempt, AuthMode};
use super::{ApiError, AuthError};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Path of the token refresh endpoint, relative to the API base URL
const REFRESH_PATH: &str = "auth/refresh";

/// Default entry point the UI returns to when the session is invalidated
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Buffered session events per subscriber before old ones are dropped
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Session lifecycle notifications for the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    TokenRefreshed,
    /// Credentials were cleared after a failed refresh; go to `redirect`
    LoginRequired { redirect: String },
    LoggedOut,
}

/// Refresh payloads arrive either inside the envelope or bare
#[derive(Deserialize)]
#[serde(untagged)]
enum RefreshPayload {
    Wrapped(ApiEnvelope<RefreshedToken>),
    Bare(RefreshedToken),
}

impl RefreshPayload {
    fn into_token(self) -> RefreshedToken {
        match self {
            RefreshPayload::Wrapped(envelope) => envelope.data,
            RefreshPayload::Bare(token) => token,
        }
    }
}

/// API client for the finance backend.
/// Clone is cheap - the connection pool, refresh lock and event channel are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    login_path: String,
    session: Session,
    // Held while a refresh is in flight so concurrent 401s share its result
    refresh_lock: Arc<Mutex<()>>,
    events: broadcast::Sender<SessionEvent>,
}

impl ApiClient {
    /// Create a new API client with default timeout and login path
    pub fn new(base_url: impl Into<String>, session: Session) -> Result<Self, ApiError> {
        Self::build(
            base_url.into(),
            DEFAULT_LOGIN_PATH.to_string(),
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            session,
        )
    }

    /// Create a client from the application configuration
    pub fn from_config(config: &Config, session: Session) -> Result<Self, ApiError> {
        Self::build(
            config.api_base_url.clone(),
            config.login_path.clone(),
            Duration::from_secs(config.request_timeout_secs),
            session,
        )
    }

    fn build(
        base_url: String,
        login_path: String,
        timeout: Duration,
        session: Session,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url,
            login_path,
            session,
            refresh_lock: Arc::new(Mutex::new(())),
            events,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if an access token is stored
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Receive session lifecycle events (login, refresh, invalidation, logout)
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn notify(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // ===== Core request path =====

    /// Send a request with the stored access token.
    ///
    /// A first 401 triggers one token refresh and one resend with the new
    /// token. A 401 on the resend, or any other failure status, is returned
    /// to the caller unchanged.
    pub async fn send(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let mut token = match request.auth() {
            AuthMode::Bearer | AuthMode::BearerNoRefresh => self.session.access_token()?,
            AuthMode::Public => None,
        };
        let mut attempt = Attempt::Initial;

        loop {
            let response = self.dispatch(request, token.as_deref(), attempt).await?;

            if response.status() != StatusCode::UNAUTHORIZED || request.auth() != AuthMode::Bearer {
                return Self::check_response(response).await;
            }

            match attempt {
                Attempt::Initial => {
                    debug!(path = request.path(), "Access token rejected, refreshing");
                    attempt = Attempt::Retried;
                    token = Some(self.refresh_access_token(token.as_deref()).await?);
                }
                Attempt::Retried => {
                    warn!(path = request.path(), "Request rejected again after token refresh");
                    return Self::check_response(response).await;
                }
            }
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
        attempt: Attempt,
    ) -> Result<Response, ApiError> {
        debug!(
            method = %request.method(),
            path = request.path(),
            attempt = ?attempt,
            authorized = token.is_some(),
            "Sending request"
        );
        let response = request
            .build(&self.client, &self.base_url, token)?
            .send()
            .await?;
        Ok(response)
    }

    /// Obtain a new access token for a request that was rejected while
    /// carrying `rejected_token`.
    ///
    /// Refreshes are serialized. A caller that waited on another refresh
    /// reuses the token it stored instead of calling the endpoint again.
    async fn refresh_access_token(&self, rejected_token: Option<&str>) -> Result<String, ApiError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.session.access_token()? {
            if rejected_token != Some(current.as_str()) {
                debug!("Access token was refreshed by a concurrent request");
                return Ok(current);
            }
        }

        let refresh_token = match self.session.refresh_token()? {
            Some(token) => token,
            None => {
                warn!("Access token rejected and no refresh token is stored");
                return Err(AuthError::NoRefreshToken.into());
            }
        };

        match self.request_new_token(&refresh_token).await {
            Ok(refreshed) => {
                match refreshed.refresh_token {
                    Some(ref rotated) => self.session.set_tokens(&refreshed.access_token, rotated)?,
                    None => self.session.set_access_token(&refreshed.access_token)?,
                }
                info!("Access token refreshed");
                self.notify(SessionEvent::TokenRefreshed);
                Ok(refreshed.access_token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                self.invalidate_session();
                Err(e.into())
            }
        }
    }

    /// Call the refresh endpoint with the refresh token as bearer credential
    async fn request_new_token(&self, refresh_token: &str) -> Result<RefreshedToken, AuthError> {
        let url = ApiRequest::post(REFRESH_PATH).url(&self.base_url);
        let credential = bearer(refresh_token)?;

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, credential)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(Box::new(e.into())))?;

        let response = Self::check_response(response)
            .await
            .map_err(|e| AuthError::RefreshFailed(Box::new(e)))?;

        let text = response
            .text()
            .await
            .map_err(|e| AuthError::RefreshFailed(Box::new(e.into())))?;

        let token = serde_json::from_str::<RefreshPayload>(&text)
            .map_err(|e| AuthError::MalformedRefreshResponse(e.to_string()))?
            .into_token();

        if token.access_token.is_empty() {
            return Err(AuthError::MalformedRefreshResponse(
                "empty access token".to_string(),
            ));
        }
        Ok(token)
    }

    /// Clear both tokens and tell the UI to return to the login entry point
    fn invalidate_session(&self) {
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear stored credentials");
        }
        info!(redirect = %self.login_path, "Session invalidated");
        self.notify(SessionEvent::LoginRequired {
            redirect: self.login_path.clone(),
        });
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    // ===== Envelope helpers =====

    /// Send a request and decode the `data` field of the response
    pub async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let text = response.text().await?;
        serde_json::from_str::<ApiEnvelope<T>>(&text)
            .map(|envelope| envelope.data)
            .map_err(|e| {
                ApiError::InvalidResponse(format!(
                    "Failed to parse response from {}: {}",
                    request.path(),
                    e
                ))
            })
    }

    /// Send a request and discard the response body
    pub async fn execute_unit(&self, request: &ApiRequest) -> Result<(), ApiError> {
        self.send(request).await?;
        Ok(())
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(&ApiRequest::get(path)).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(&ApiRequest::post(path).json(body)?).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute_unit(&ApiRequest::delete(path)).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("login_path", &self.login_path)
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_payload_wrapped() {
        let json = r#"{"data": {"access_token": "A2"}}"#;
        let token = serde_json::from_str::<RefreshPayload>(json).unwrap().into_token();
        assert_eq!(token.access_token, "A2");
        assert!(token.refresh_token.is_none());
    }

    #[test]
    fn test_refresh_payload_bare_with_rotation() {
        let json = r#"{"access_token": "A2", "refresh_token": "R2"}"#;
        let token = serde_json::from_str::<RefreshPayload>(json).unwrap().into_token();
        assert_eq!(token.access_token, "A2");
        assert_eq!(token.refresh_token.as_deref(), Some("R2"));
    }

    #[test]
    fn test_refresh_payload_missing_token() {
        assert!(serde_json::from_str::<RefreshPayload>(r#"{"data": {}}"#).is_err());
    }

    #[test]
    fn test_new_client_is_unauthenticated() {
        let client = ApiClient::new("http://localhost:8000", Session::in_memory()).unwrap();
        assert!(!client.is_authenticated());
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn test_notify_without_subscribers_is_noop() {
        let client = ApiClient::new("http://localhost:8000", Session::in_memory()).unwrap();
        client.notify(SessionEvent::LoggedOut);

        let mut events = client.subscribe();
        client.notify(SessionEvent::TokenRefreshed);
        assert_eq!(events.try_recv().unwrap(), SessionEvent::TokenRefreshed);
    }
}
