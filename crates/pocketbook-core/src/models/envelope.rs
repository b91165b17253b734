use serde::{Deserialize, Serialize};

/// Every API response wraps its payload in a `data` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
}

/// Failure payload: `{ "data": { "message": ..., "error_details": ... } }`.
/// Either field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_details: Option<String>,
}

impl ErrorBody {
    /// Parse an error response body, wrapped or bare
    pub fn parse(body: &str) -> Option<Self> {
        if let Ok(envelope) = serde_json::from_str::<ApiEnvelope<ErrorBody>>(body) {
            if envelope.data.has_text() {
                return Some(envelope.data);
            }
        }
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .filter(ErrorBody::has_text)
    }

    /// Human-readable text, preferring `message`
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .or_else(|| self.error_details.as_deref().filter(|d| !d.is_empty()))
    }

    fn has_text(&self) -> bool {
        self.text().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_message() {
        let body = r#"{"data": {"message": "Email already registered"}}"#;
        let err = ErrorBody::parse(body).unwrap();
        assert_eq!(err.text(), Some("Email already registered"));
    }

    #[test]
    fn test_parse_wrapped_error_details() {
        let body = r#"{"data": {"error_details": "amount must be positive"}}"#;
        let err = ErrorBody::parse(body).unwrap();
        assert_eq!(err.text(), Some("amount must be positive"));
    }

    #[test]
    fn test_parse_prefers_message_over_details() {
        let body = r#"{"data": {"message": "Invalid input", "error_details": "amount"}}"#;
        assert_eq!(ErrorBody::parse(body).unwrap().text(), Some("Invalid input"));
    }

    #[test]
    fn test_parse_bare_message() {
        let body = r#"{"message": "Token expired"}"#;
        assert_eq!(ErrorBody::parse(body).unwrap().text(), Some("Token expired"));
    }

    #[test]
    fn test_parse_non_json_or_empty() {
        assert!(ErrorBody::parse("<html>502 Bad Gateway</html>").is_none());
        assert!(ErrorBody::parse(r#"{"data": {}}"#).is_none());
        assert!(ErrorBody::parse(r#"{"data": {"message": ""}}"#).is_none());
    }
}
