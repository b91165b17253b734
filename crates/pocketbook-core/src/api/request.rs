//! Outbound request snapshots.
//!
//! An `ApiRequest` is built once and never mutated. The retry path resends
//! the same value with a different bearer token, and the `Attempt` marker
//! travels alongside it so a request is retried at most once.

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;

use super::{ApiError, AuthError};

/// Whether a request carries the session's bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Attach the access token and recover from 401 by refreshing it
    Bearer,
    /// Attach the access token but report a 401 as-is
    BearerNoRefresh,
    /// No credentials; a 401 is reported as-is (login, registration, password reset)
    Public,
}

/// Position of a send within one logical request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Initial,
    Retried,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
    auth: AuthMode,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            auth: AuthMode::Bearer,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn query(mut self, pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Send without credentials and skip token refresh
    pub fn public(mut self) -> Self {
        self.auth = AuthMode::Public;
        self
    }

    /// Keep the bearer token but never refresh it on 401
    pub fn without_refresh(mut self) -> Self {
        self.auth = AuthMode::BearerNoRefresh;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn auth(&self) -> AuthMode {
        self.auth
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Join the request path onto a base URL without doubling slashes
    pub(crate) fn url(&self, base_url: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    /// Build a reqwest request for one attempt. `token` replaces any
    /// `Authorization` header carried by the snapshot.
    pub(crate) fn build(
        &self,
        client: &Client,
        base_url: &str,
        token: Option<&str>,
    ) -> Result<RequestBuilder, ApiError> {
        let mut headers = self.headers.clone();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.remove(header::AUTHORIZATION);
        if let Some(token) = token {
            headers.insert(header::AUTHORIZATION, bearer(token)?);
        }

        let mut builder = client
            .request(self.method.clone(), self.url(base_url))
            .headers(headers);
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        if let Some(ref body) = self.body {
            builder = builder.json(body);
        }
        Ok(builder)
    }
}

/// `Authorization: Bearer <token>` header value, marked sensitive
pub(crate) fn bearer(token: &str) -> Result<HeaderValue, AuthError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| AuthError::InvalidToken)?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join() {
        let req = ApiRequest::get("/transactions");
        assert_eq!(req.url("http://localhost:8000/api/"), "http://localhost:8000/api/transactions");
        assert_eq!(req.url("http://localhost:8000/api"), "http://localhost:8000/api/transactions");

        let req = ApiRequest::get("budgets");
        assert_eq!(req.url("http://localhost:8000"), "http://localhost:8000/budgets");
    }

    #[test]
    fn test_builder_defaults() {
        let req = ApiRequest::post("/auth/login");
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.auth(), AuthMode::Bearer);
        assert!(req.body().is_none());

        let req = req.public();
        assert_eq!(req.auth(), AuthMode::Public);

        let req = ApiRequest::post("/auth/logout").without_refresh();
        assert_eq!(req.auth(), AuthMode::BearerNoRefresh);
    }

    #[test]
    fn test_build_replaces_authorization_header() {
        let client = Client::new();
        let req = ApiRequest::get("/budgets").header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer stale"),
        );

        let built = req
            .build(&client, "http://localhost", Some("A2"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(built.headers()[header::AUTHORIZATION], "Bearer A2");
        assert_eq!(built.url().as_str(), "http://localhost/budgets");

        let anonymous = req.build(&client, "http://localhost", None).unwrap().build().unwrap();
        assert!(anonymous.headers().get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_build_encodes_query_and_body() {
        let client = Client::new();
        let req = ApiRequest::post("/transactions/parse")
            .query(vec![("page".to_string(), "2".to_string())])
            .json(&serde_json::json!({"text": "coffee 3.50"}))
            .unwrap();

        let built = req.build(&client, "http://localhost", None).unwrap().build().unwrap();
        assert_eq!(built.url().query(), Some("page=2"));
        let body = built.body().and_then(|b| b.as_bytes()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(value["text"], "coffee 3.50");
    }

    #[test]
    fn test_bearer_rejects_newlines() {
        assert!(matches!(bearer("abc\n"), Err(AuthError::InvalidToken)));
        assert!(bearer("abc").unwrap().is_sensitive());
    }

    #[test]
    fn test_build_with_invalid_token_requires_login() {
        let client = Client::new();
        let err = ApiRequest::get("/budgets")
            .build(&client, "http://localhost", Some("A1\r\nX-Injected: 1"))
            .unwrap_err();

        assert!(matches!(err, ApiError::Auth(AuthError::InvalidToken)));
        assert!(err.requires_login());
    }
}
