use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Linkding API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bookmark {0} not found")]
    BookmarkNotFound(i64),

    #[error("A sync is already in progress")]
    AlreadyRunning,

    #[error("Sync is paused")]
    Paused,

    #[error("Sync was cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// How the sync engine reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network unreachable, timeouts, 5xx and rate limiting. Retried on the backoff schedule.
    Transient,
    /// Requested by the user or the host. Not a failure.
    Cancelled,
    /// Credentials, settings, malformed responses, storage. Needs a manual trigger.
    Fatal,
}

impl AppError {
    pub fn api(status: reqwest::StatusCode, message: impl Into<String>) -> Self {
        AppError::Api {
            status: status.as_u16(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Http(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
                    ErrorKind::Transient
                } else if let Some(status) = e.status() {
                    status_kind(status.as_u16())
                } else {
                    ErrorKind::Fatal
                }
            }
            AppError::Api { status, .. } => status_kind(*status),
            AppError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// True when the failure proves the server could not be reached at all.
    pub fn is_offline(&self) -> bool {
        matches!(self, AppError::Http(e) if e.is_connect())
    }
}

fn status_kind(status: u16) -> ErrorKind {
    match status {
        408 | 429 => ErrorKind::Transient,
        500..=599 => ErrorKind::Transient,
        _ => ErrorKind::Fatal,
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
