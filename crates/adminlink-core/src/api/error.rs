use reqwest::header::HeaderMap;
use serde_json::Value;
use thiserror::Error;

use super::transport::TransportError;
use crate::navigation::NavigationIntent;
use crate::network::Connectivity;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

static NO_NAVIGATION: NavigationIntent = NavigationIntent::Stay;

/// A non-success HTTP response, kept whole for the caller.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub status: u16,
    pub body: Value,
    pub headers: HeaderMap,
    pub connectivity: Option<Connectivity>,
}

impl ErrorResponse {
    pub fn new(status: u16, body: Value, headers: HeaderMap) -> Self {
        Self {
            status,
            body,
            headers,
            connectivity: None,
        }
    }

    /// Server-supplied message, if the body is `{"error": ...}` or `{"message": ...}`
    pub fn message(&self) -> Option<&str> {
        ["error", "message"]
            .iter()
            .find_map(|key| self.body.get(key).and_then(Value::as_str))
    }

    /// Body rendered for logs and error messages, truncated
    pub fn body_text(&self) -> String {
        let text = match &self.body {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        truncate_body(&text)
    }
}

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - token may be expired")]
    Unauthorized {
        response: ErrorResponse,
        navigation: NavigationIntent,
    },

    #[error("Access denied: {}", .response.body_text())]
    AccessDenied {
        response: ErrorResponse,
        navigation: NavigationIntent,
    },

    #[error("Resource not found: {}", .0.body_text())]
    NotFound(ErrorResponse),

    #[error("Rate limited - please wait before retrying")]
    RateLimited(ErrorResponse),

    #[error("Server error ({}): {}", .0.status, .0.body_text())]
    ServerError(ErrorResponse),

    #[error("Unexpected status {}: {}", .0.status, .0.body_text())]
    UnexpectedStatus(ErrorResponse),

    #[error("Network error after {attempts} attempt(s): {source}")]
    Network {
        source: TransportError,
        attempts: u32,
        connectivity: Option<Connectivity>,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn from_response(response: ErrorResponse) -> Self {
        match response.status {
            401 => ApiError::Unauthorized {
                response,
                navigation: NavigationIntent::Stay,
            },
            403 => ApiError::AccessDenied {
                response,
                navigation: NavigationIntent::Stay,
            },
            404 => ApiError::NotFound(response),
            429 => ApiError::RateLimited(response),
            500..=599 => ApiError::ServerError(response),
            _ => ApiError::UnexpectedStatus(response),
        }
    }

    pub fn network(source: TransportError, attempts: u32) -> Self {
        ApiError::Network {
            source,
            attempts,
            connectivity: None,
        }
    }

    /// The HTTP response, when the server answered
    pub fn response(&self) -> Option<&ErrorResponse> {
        match self {
            ApiError::Unauthorized { response, .. } | ApiError::AccessDenied { response, .. } => {
                Some(response)
            }
            ApiError::NotFound(response)
            | ApiError::RateLimited(response)
            | ApiError::ServerError(response)
            | ApiError::UnexpectedStatus(response) => Some(response),
            _ => None,
        }
    }

    fn response_mut(&mut self) -> Option<&mut ErrorResponse> {
        match self {
            ApiError::Unauthorized { response, .. } | ApiError::AccessDenied { response, .. } => {
                Some(response)
            }
            ApiError::NotFound(response)
            | ApiError::RateLimited(response)
            | ApiError::ServerError(response)
            | ApiError::UnexpectedStatus(response) => Some(response),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.response().map(|r| r.status)
    }

    /// True when no HTTP response was received
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network { .. })
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. } | ApiError::AccessDenied { .. })
    }

    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            ApiError::Network { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Connectivity classification attached by a network status observer
    pub fn connectivity(&self) -> Option<Connectivity> {
        match self {
            ApiError::Network { connectivity, .. } => *connectivity,
            other => other.response().and_then(|r| r.connectivity),
        }
    }

    pub fn set_connectivity(&mut self, value: Connectivity) {
        match self {
            ApiError::Network { connectivity, .. } => *connectivity = Some(value),
            other => {
                if let Some(response) = other.response_mut() {
                    response.connectivity = Some(value);
                }
            }
        }
    }

    /// Where the host should navigate after this failure, if anywhere
    pub fn navigation(&self) -> &NavigationIntent {
        match self {
            ApiError::Unauthorized { navigation, .. } | ApiError::AccessDenied { navigation, .. } => {
                navigation
            }
            _ => &NO_NAVIGATION,
        }
    }

    pub(crate) fn set_navigation(&mut self, intent: NavigationIntent) {
        if let ApiError::Unauthorized { navigation, .. } | ApiError::AccessDenied { navigation, .. } =
            self
        {
            *navigation = intent;
        }
    }
}
