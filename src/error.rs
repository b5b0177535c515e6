//! Error types shared by the engine and the storage backends.

use std::path::PathBuf;

/// What went wrong inside a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The object (or container) does not exist.
    NotFound,
    /// Credentials were rejected.
    Unauthorized,
    /// The request never produced a usable response.
    Transport,
    /// Any other failure reported by the backend.
    Storage,
}

/// A failure reported by a [`StorageBackend`](crate::storage::StorageBackend).
///
/// The HTTP status of the failing response is kept verbatim so callers can
/// tell an authentication problem (401) apart from a flaky network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    kind: BackendErrorKind,
    status: Option<u16>,
    message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        BackendError {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Transport, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Storage, message)
    }

    /// Build an error from a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => BackendErrorKind::Unauthorized,
            404 => BackendErrorKind::NotFound,
            _ => BackendErrorKind::Storage,
        };
        BackendError {
            kind,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> BackendErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == BackendErrorKind::NotFound
    }
}

/// Errors raised by the engine.
#[derive(Debug, thiserror::Error)]
pub enum ImagerError {
    #[error("Please provide the config")]
    ConfigMissing,

    #[error("Please specify a storage")]
    StorageSectionMissing,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Backend {0} is not present in the storage config")]
    UnknownBackend(String),

    #[error("Please specify a proper variant OR provide a default")]
    VariantRequired,

    #[error("Please provide a variant which you have specified in the config file: {0}")]
    UnknownVariant(String),

    #[error("Variant {0} does not target any enabled backend")]
    NoBackends(String),

    #[error("Invalid remote name: {0}")]
    InvalidName(String),

    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backend {backend} failed: {source}")]
    Backend {
        backend: String,
        #[source]
        source: BackendError,
    },
}

impl ImagerError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ImagerError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn backend(backend: impl Into<String>, source: BackendError) -> Self {
        ImagerError::Backend {
            backend: backend.into(),
            source,
        }
    }

    /// Transport status carried by a backend failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ImagerError::Backend { source, .. } => source.status(),
            _ => None,
        }
    }

    /// The `std::io::ErrorKind` of a local file failure.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            ImagerError::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ImagerError>;
