/// Shared error type used across all colloquy crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// Shutdown was requested while a run was in flight.  Kept distinct
    /// from the other variants so callers can print a cancellation
    /// notice instead of an error chain.
    #[error("interrupted by shutdown")]
    Interrupted,

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error came from the transport layer (connection,
    /// timeout, or a non-2xx provider response).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::Timeout(_) | Error::Provider { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupted_display_is_stable() {
        // The CLI matches on this variant, but the message is user-facing.
        assert_eq!(Error::Interrupted.to_string(), "interrupted by shutdown");
    }

    #[test]
    fn transport_classification() {
        assert!(Error::Http("connection refused".into()).is_transport());
        assert!(Error::Timeout("read".into()).is_transport());
        assert!(Error::Provider {
            provider: "openrouter".into(),
            message: "HTTP 500".into()
        }
        .is_transport());
        assert!(!Error::Interrupted.is_transport());
        assert!(!Error::Config("bad".into()).is_transport());
    }
}
