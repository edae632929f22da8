//! Error type for the deploy webhook client.

use thiserror::Error;

/// Errors raised while delivering a deploy notice.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The endpoint answered with a non-success status.
    #[error("webhook returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// DNS, connection or timeout failure underneath `reqwest`.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = NotifyError::Api {
            status: 503,
            message: "deploy service unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "webhook returned status 503: deploy service unavailable"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NotifyError>();
    }
}
