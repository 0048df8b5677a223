// src/error.rs
use thiserror::Error;

/// Failure of a single HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// No response was received.
    #[error("network error: {0}")]
    Network(String),

    /// A response arrived with a 4xx/5xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response body: {0}")]
    Decode(String),

    /// The request could not be built (bad method, URL or header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            HttpError::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            HttpError::Decode(err.to_string())
        } else {
            HttpError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_only_for_401_status() {
        let err = HttpError::Status {
            status: 401,
            body: String::new(),
        };
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(401));

        let forbidden = HttpError::Status {
            status: 403,
            body: "nope".to_string(),
        };
        assert!(!forbidden.is_unauthorized());

        assert!(!HttpError::Network("reset".to_string()).is_unauthorized());
        assert_eq!(HttpError::Network("reset".to_string()).status(), None);
    }

    #[test]
    fn test_display() {
        let err = HttpError::Status {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404: not found");
    }
}
