use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

use crate::error::BackendError;

pub mod local;
pub mod rackspace;
pub mod s3;

/// An object ready to be written: key, bytes and MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObject {
    pub key: String,
    pub data: Bytes,
    pub content_type: &'static str,
}

/// A place assets can be written to and deleted from.
///
/// Implementations must be safe to call concurrently for independent keys,
/// and `delete` must treat a missing object as success.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write the object and return its public URI.
    async fn store(&self, object: &StorageObject) -> Result<String, BackendError>;
    async fn delete(&self, key: &str) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    S3,
    Rackspace,
    /// Registered by the host application.
    Custom,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Local => "local",
            BackendKind::S3 => "s3",
            BackendKind::Rackspace => "rackspace",
            BackendKind::Custom => "custom",
        };
        f.write_str(name)
    }
}
