use thiserror::Error;

/// Core error type for the summary client.
/// Internally, modules can use `anyhow::Result<T>` for convenience,
/// but public boundaries should expose `CoreResult<T>` with this error.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("invalid summary request: {0}")]
    Validation(String),

    #[error("summary service is rate limiting requests")]
    RateLimited { retry_after: Option<u64> },

    /// Connection failure, non-success status, or missing body before any
    /// record was read.
    #[error("{message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// Failure while reading the body after the connection was established.
    #[error("summary stream interrupted: {0}")]
    StreamRead(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SummaryError {
    pub(crate) fn unavailable(status: Option<u16>) -> Self {
        Self::Transport {
            status,
            message: "summary service unavailable".into(),
        }
    }

    /// Stable short name, used as the `error.kind` telemetry attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::RateLimited { .. } | Self::Transport { .. } => "transport",
            Self::StreamRead(_) => "stream_read",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, SummaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_group_transport_failures() {
        assert_eq!(SummaryError::unavailable(Some(503)).kind(), "transport");
        assert_eq!(SummaryError::RateLimited { retry_after: None }.kind(), "transport");
        assert_eq!(SummaryError::StreamRead("eof".into()).kind(), "stream_read");
        assert_eq!(SummaryError::Validation("x".into()).kind(), "validation");
    }

    #[test]
    fn transport_display_is_the_bare_message() {
        let err = SummaryError::Transport {
            status: Some(404),
            message: "country not found".into(),
        };
        assert_eq!(err.to_string(), "country not found");
        assert_eq!(
            SummaryError::unavailable(None).to_string(),
            "summary service unavailable"
        );
    }
}
