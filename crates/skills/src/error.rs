use std::path::PathBuf;

/// Why a fetch failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("not found: {location}")]
    NotFound { location: String },
    #[error("timed out after {secs}s fetching {location}")]
    Timeout { location: String, secs: u64 },
    #[error("HTTP {status} fetching {location}")]
    Status { location: String, status: u16 },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Timeout { .. } => "timeout",
            Self::Status { .. } | Self::Http(_) => "http",
            Self::Io { .. } => "io",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unrecognized skill source '{location}'")]
    Resolution { location: String },
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("skill '{name}' failed validation: {}", .errors.join("; "))]
    Validation { name: String, errors: Vec<String> },
    #[error("failed to write {}: {}", .path.display(), .source)]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed document at {}: {}", .path.display(), .source)]
    IndexCorruption {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("skill name mismatch: requested '{requested}', document declares '{declared}'")]
    NameMismatch { requested: String, declared: String },
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn store_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreWrite {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn validation(name: impl Into<String>, errors: Vec<String>) -> Self {
        Self::Validation {
            name: name.into(),
            errors,
        }
    }
}

impl From<uasp_common::Error> for Error {
    fn from(err: uasp_common::Error) -> Self {
        match err {
            uasp_common::Error::Path { path, source } => Self::StoreWrite { path, source },
            uasp_common::Error::Io(source) => Self::Io(source),
            uasp_common::Error::Message(message) => Self::Message { message },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
