//! Error types for the analysis pipeline.
//!
//! `CompletionError` covers a single call to the completion endpoint;
//! `PipelineError` wraps it with the stage that failed so the operator can
//! tell a batch failure from a summary failure.

/// Failure of one completion request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    /// Connection, timeout or other network-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },

    /// The body did not have the expected `choices[0].message.content` shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Missing or rejected credential.
    #[error("authentication failed: {0}")]
    Authentication(String),
}

impl CompletionError {
    /// Create transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create malformed response error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create authentication error
    pub fn authentication<S: Into<String>>(msg: S) -> Self {
        Self::Authentication(msg.into())
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Network failures, rate limiting (429) and server-side errors (5xx)
    /// are transient; everything else is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Service { status, .. } => *status == 429 || (500..600).contains(status),
            Self::MalformedResponse(_) | Self::Authentication(_) => false,
        }
    }
}

/// Failure of a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Bad batch size, missing input file, unknown column, and similar.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The input file could not be parsed.
    #[error("dataset error at line {line} in {path}: {message}")]
    Dataset {
        path: String,
        line: u64,
        message: String,
    },

    /// One of the per-batch analysis requests failed.
    #[error("analysis of batch {index} failed: {source}")]
    Analysis {
        index: usize,
        #[source]
        source: CompletionError,
    },

    /// The closing summary request failed.
    #[error("summary request failed: {0}")]
    Summary(#[source] CompletionError),

    /// The fan-out did not finish within the configured bound.
    #[error("analysis fan-out timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl PipelineError {
    /// Create invalid configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Name of the pipeline stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "configuration",
            Self::Dataset { .. } => "load",
            Self::Analysis { .. } | Self::Timeout { .. } => "analysis",
            Self::Summary(_) => "summary",
        }
    }

    /// The underlying completion error, if any.
    pub fn completion_error(&self) -> Option<&CompletionError> {
        match self {
            Self::Analysis { source, .. } => Some(source),
            Self::Summary(source) => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CompletionError::transport("reset").is_retryable());
        assert!(CompletionError::Service {
            status: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(CompletionError::Service {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!CompletionError::Service {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!CompletionError::authentication("bad key").is_retryable());
        assert!(!CompletionError::malformed("no choices").is_retryable());
    }

    #[test]
    fn test_stage_names() {
        let err = PipelineError::Analysis {
            index: 1,
            source: CompletionError::transport("refused"),
        };
        assert_eq!(err.stage(), "analysis");
        assert!(err.to_string().contains("batch 1"));
        assert_eq!(
            err.completion_error(),
            Some(&CompletionError::transport("refused"))
        );

        assert_eq!(PipelineError::config("x").stage(), "configuration");
        assert_eq!(
            PipelineError::Summary(CompletionError::malformed("x")).stage(),
            "summary"
        );
        assert_eq!(PipelineError::Timeout { seconds: 5 }.stage(), "analysis");
    }
}
