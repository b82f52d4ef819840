//! Square client errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry of Square's `errors` array
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SquareApiErrorDetail {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<SquareApiErrorDetail>,
}

#[derive(Debug, Error)]
pub enum SquareError {
    /// 429 persisted past the retry budget
    #[error("Square rate limit exceeded on {endpoint} after {attempts} attempts")]
    RateLimited { endpoint: String, attempts: u32 },

    /// Any other non-2xx response
    #[error("Square API error {status} on {endpoint}: {}", summarize(.errors, .body))]
    Api {
        status: u16,
        endpoint: String,
        errors: Vec<SquareApiErrorDetail>,
        body: String,
    },

    #[error("Square request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("Square transport error on {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode Square response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// Missing or undecryptable merchant access token
    #[error("Square access token unavailable: {0}")]
    Token(String),
}

impl SquareError {
    /// Build an `Api` error from a raw response body, parsing Square's error array when present
    pub fn api(status: u16, endpoint: &str, body: String) -> Self {
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        SquareError::Api {
            status,
            endpoint: endpoint.to_string(),
            errors: parsed.errors,
            body,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            SquareError::Api { status, .. } => Some(*status),
            SquareError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Transient failures the caller may retry later
    pub fn is_transient(&self) -> bool {
        match self {
            SquareError::RateLimited { .. }
            | SquareError::Timeout { .. }
            | SquareError::Transport { .. } => true,
            SquareError::Api { status, .. } => *status >= 500,
            SquareError::Decode { .. } | SquareError::Token(_) => false,
        }
    }
}

fn summarize(errors: &[SquareApiErrorDetail], body: &str) -> String {
    match errors.first() {
        Some(e) => match &e.detail {
            Some(detail) => format!("{} ({detail})", e.code),
            None => e.code.clone(),
        },
        None => body.chars().take(200).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_parses_square_body() {
        let body = r#"{"errors":[{"category":"INVALID_REQUEST_ERROR","code":"NOT_FOUND","detail":"Order not found"}]}"#;
        let err = SquareError::api(400, "/orders/abc", body.to_string());
        match &err {
            SquareError::Api { errors, status, .. } => {
                assert_eq!(*status, 400);
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].code, "NOT_FOUND");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.to_string().contains("NOT_FOUND (Order not found)"));
    }

    #[test]
    fn api_error_keeps_unparseable_body() {
        let err = SquareError::api(502, "/orders/abc", "<html>bad gateway</html>".into());
        assert!(err.to_string().contains("bad gateway"));
        assert!(err.is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        assert!(!SquareError::api(400, "/x", "{}".into()).is_transient());
        assert!(!SquareError::Token("missing".into()).is_transient());
        assert!(
            SquareError::RateLimited {
                endpoint: "/x".into(),
                attempts: 4
            }
            .is_transient()
        );
    }
}
