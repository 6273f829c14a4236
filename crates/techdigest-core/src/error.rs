use std::fmt;
use std::path::PathBuf;

/// Errors that can occur across the digest pipeline.
///
/// Library crates return this type directly; the binary converts it into a
/// `miette` report at the boundary. Only [`DigestError::Provider`] and
/// [`DigestError::Parse`] are recoverable during a classification run.
///
/// # Examples
///
/// ```
/// use techdigest_core::DigestError;
///
/// let err = DigestError::Config("category list is empty".into());
/// assert!(err.to_string().contains("category list is empty"));
/// assert!(!err.is_recoverable());
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DigestError {
    /// Invalid or missing configuration, including a bad category registry.
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(techdigest::config),
        help("check the [classifier] and [[categories]] sections of .techdigest.toml")
    )]
    Config(String),

    /// The classification provider could not be reached or refused the call.
    #[error("provider error ({kind}): {message}")]
    #[diagnostic(code(techdigest::provider))]
    Provider {
        /// What went wrong at the transport level.
        kind: ProviderErrorKind,
        /// Detail from the HTTP client or the response body.
        message: String,
    },

    /// The provider answered, but not with the expected id → category mapping.
    #[error("parse error: {0}")]
    #[diagnostic(code(techdigest::parse))]
    Parse(String),

    /// The article list handed over by the feed fetcher is malformed.
    #[error("invalid article input: {0}")]
    #[diagnostic(code(techdigest::input))]
    Input(String),

    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl DigestError {
    /// Build a [`DigestError::Provider`] of the given kind.
    pub fn provider(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self::Provider {
            kind,
            message: message.into(),
        }
    }

    /// Whether a classification run can absorb this error by falling back.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Parse(_))
    }

    /// Whether re-sending the same batch could plausibly succeed.
    ///
    /// Only network failures, rate limiting and 5xx statuses qualify. Auth
    /// failures, other statuses, bad envelopes and parse errors are
    /// deterministic for a given request and never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { kind, .. } => matches!(
                kind,
                ProviderErrorKind::Network
                    | ProviderErrorKind::RateLimited
                    | ProviderErrorKind::Status(500..=599)
            ),
            _ => false,
        }
    }
}

/// Transport-level failure categories for a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Connection failure or timeout.
    Network,
    /// HTTP 401 / 403.
    Auth,
    /// HTTP 429.
    RateLimited,
    /// Any other non-success HTTP status.
    Status(u16),
    /// The HTTP body was not the provider's documented envelope.
    Envelope,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::Network => write!(f, "network"),
            ProviderErrorKind::Auth => write!(f, "authentication"),
            ProviderErrorKind::RateLimited => write!(f, "rate limited"),
            ProviderErrorKind::Status(code) => write!(f, "status {code}"),
            ProviderErrorKind::Envelope => write!(f, "unexpected envelope"),
        }
    }
}
