use thiserror::Error;

/// Everything that can go wrong between pressing Enter and a rendered result.
///
/// All variants end up in the same error panel; the variant only matters for
/// logging and for asserting which branch fired.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("network request failed: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("{0}")]
    Backend(String),
}

impl QueryError {
    /// Text written into the error panel.
    pub fn user_message(&self) -> String {
        format!("System Error: {}", self)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::Network(_) => "network",
            QueryError::Malformed(_) => "malformed",
            QueryError::Backend(_) => "backend",
        }
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            QueryError::Network("request timed out".to_string())
        } else {
            QueryError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(e: serde_json::Error) -> Self {
        QueryError::Malformed(e.to_string())
    }
}
