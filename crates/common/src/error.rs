use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a snapshot fetch produced no snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request was superseded or the dashboard deactivated. Not an error
    /// from the user's point of view.
    #[error("request cancelled")]
    Cancelled,

    /// Upstream asked us to slow down. Carries the service's error tag.
    #[error("upstream rate limited: {0}")]
    RateLimited(String),

    /// The service answered `success: false` or a non-2xx status.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Connection, TLS or timeout failure.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    /// Recoverable conditions surface as a warning and keep data on screen.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FetchError::RateLimited(_))
    }

    /// Classify a service-provided error string.
    pub fn from_upstream_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if looks_rate_limited(&message) {
            FetchError::RateLimited(message)
        } else {
            FetchError::Upstream(message)
        }
    }
}

fn looks_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["rate_limit", "rate limit", "ratelimit", "too many requests", "429"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_tags_are_recognised() {
        for msg in ["rate_limit", "Upstream Rate Limit hit", "HTTP 429", "Too Many Requests"] {
            let err = FetchError::from_upstream_message(msg);
            assert!(err.is_recoverable(), "{msg} should be a rate limit");
        }
    }

    #[test]
    fn io_failures_convert_with_question_mark() {
        fn bind() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::AddrInUse, "port 8080 taken"))?;
            Ok(())
        }
        let err = bind().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "IO error: port 8080 taken");
    }

    #[test]
    fn other_messages_are_generic_failures() {
        let err = FetchError::from_upstream_message("CoinGecko error: 500");
        assert_eq!(err, FetchError::Upstream("CoinGecko error: 500".into()));
        assert!(!err.is_recoverable());
        assert!(!err.is_cancelled());
    }
}
