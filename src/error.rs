use std::time::Duration;
use thiserror::Error;

/// Connection-level failure kinds the retry executor cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    Reset,
    Refused,
    Timeout,
    Other,
}

impl std::fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Reset => "connection reset",
            Self::Refused => "connection refused",
            Self::Timeout => "timeout",
            Self::Other => "network error",
        };
        f.write_str(s)
    }
}

/// Failures talking to the remote file store
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Drive API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("{kind}: {message}")]
    Network { kind: NetworkKind, message: String },

    #[error("Failed to decode Drive response: {0}")]
    Decode(String),

    #[error("Authorization error: {0}")]
    Auth(String),

    #[error("Maximum folder depth exceeded ({depth} levels) at folder {folder_id}")]
    DepthExceeded { folder_id: String, depth: usize },

    #[error("Gave up on '{target}' after {elapsed:?}: {source}")]
    Exhausted {
        target: String,
        elapsed: Duration,
        #[source]
        source: Box<DriveError>,
    },

    #[error("Failed to {action} '{target}': {source}")]
    Operation {
        action: &'static str,
        target: String,
        #[source]
        source: Box<DriveError>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Status codes the remote store uses for transient conditions
const RETRYABLE_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

impl DriveError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => RETRYABLE_STATUS.contains(status),
            Self::Network { kind, .. } => {
                matches!(kind, NetworkKind::Reset | NetworkKind::Refused | NetworkKind::Timeout)
            }
            _ => false,
        }
    }

    /// True when this error, or anything it wraps, is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Exhausted { source, .. } | Self::Operation { source, .. } => {
                source.is_cancelled()
            }
            _ => false,
        }
    }

    /// Attach the failed action and its target. Cancellation passes through
    /// untouched so callers can still tell it apart from a failure.
    pub fn context(self, action: &'static str, target: impl Into<String>) -> Self {
        if let Self::Cancelled = self {
            return self;
        }
        Self::Operation {
            action,
            target: target.into(),
            source: Box::new(self),
        }
    }

    /// Classify a transport error from reqwest
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let message = err.to_string();
        let kind = if err.is_timeout() {
            NetworkKind::Timeout
        } else {
            io_kind_in_chain(err).unwrap_or_else(|| classify_message(&format!("{:?}", err)))
        };
        Self::Network { kind, message }
    }
}

fn io_kind_in_chain(err: &(dyn std::error::Error + 'static)) -> Option<NetworkKind> {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return match io.kind() {
                std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe => Some(NetworkKind::Reset),
                std::io::ErrorKind::ConnectionRefused => Some(NetworkKind::Refused),
                std::io::ErrorKind::TimedOut => Some(NetworkKind::Timeout),
                _ => None,
            };
        }
        current = e.source();
    }
    None
}

fn classify_message(text: &str) -> NetworkKind {
    let lowered = text.to_lowercase();
    if lowered.contains("connection reset") {
        NetworkKind::Reset
    } else if lowered.contains("connection refused") {
        NetworkKind::Refused
    } else if lowered.contains("timeout") || lowered.contains("timed out") {
        NetworkKind::Timeout
    } else {
        NetworkKind::Other
    }
}

/// Failures from the AI classification collaborator
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Gemini API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Gemini request failed: {0}")]
    Network(String),

    #[error("Failed to parse AI response: {message}\nResponse: {response}")]
    Parse { message: String, response: String },

    #[error("Empty response from AI")]
    EmptyResponse,

    #[error("Estimated AI spend ${spent:.4} reached the ${limit:.2} limit")]
    BudgetExceeded { spent: f64, limit: f64 },

    #[error("Classification cancelled")]
    Cancelled,

    #[error("Gemini API key is not configured")]
    MissingApiKey,
}

/// Top-level error for setup failures that abort a run
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Drive(#[from] DriveError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Setup(String),
}
