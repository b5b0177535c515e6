use std::{fmt, sync::Arc};

use crate::{
    config::{BackendOptions, Config},
    error::{ImagerError, Result},
    storage::{
        local::LocalStorage, rackspace::RackspaceStorage, s3::S3Storage, BackendKind,
        StorageBackend,
    },
};

/// Which configured backends an engine enables: one identifier or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSelector {
    One(String),
    Many(Vec<String>),
}

impl BackendSelector {
    pub fn identifiers(&self) -> &[String] {
        match self {
            BackendSelector::One(identifier) => std::slice::from_ref(identifier),
            BackendSelector::Many(identifiers) => identifiers,
        }
    }
}

impl From<&str> for BackendSelector {
    fn from(identifier: &str) -> Self {
        BackendSelector::One(identifier.to_owned())
    }
}

impl From<String> for BackendSelector {
    fn from(identifier: String) -> Self {
        BackendSelector::One(identifier)
    }
}

impl<T: Into<String>> From<Vec<T>> for BackendSelector {
    fn from(identifiers: Vec<T>) -> Self {
        BackendSelector::Many(identifiers.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<String>, const N: usize> From<[T; N]> for BackendSelector {
    fn from(identifiers: [T; N]) -> Self {
        BackendSelector::Many(identifiers.into_iter().map(Into::into).collect())
    }
}

/// A ready-to-use storage client and the identifier it was configured under.
#[derive(Clone)]
pub struct Backend {
    identifier: String,
    kind: BackendKind,
    storage: Arc<dyn StorageBackend>,
}

impl Backend {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("identifier", &self.identifier)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Storage clients owned by one engine, in selector order.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: Vec<Backend>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        BackendRegistry::default()
    }

    /// Build one client per selected identifier that has a `storage` entry.
    ///
    /// Identifiers without an entry are skipped unless `strict_backends` is set.
    pub fn from_config(config: &Config, selector: &BackendSelector) -> Result<Self> {
        let mut registry = BackendRegistry::new();

        for identifier in selector.identifiers() {
            if registry.get(identifier).is_some() {
                continue;
            }
            let Some(options) = config.backend_options(identifier) else {
                if config.strict_backends {
                    return Err(ImagerError::UnknownBackend(identifier.clone()));
                }
                tracing::warn!(backend = %identifier, "No storage config for backend, skipping");
                continue;
            };

            let (kind, storage) = build(options)?;
            tracing::debug!(backend = %identifier, %kind, "Configured backend");
            registry.push(identifier.clone(), kind, storage);
        }

        Ok(registry)
    }

    /// Register a host-provided backend, replacing any with the same identifier.
    pub fn insert(&mut self, identifier: impl Into<String>, storage: Arc<dyn StorageBackend>) {
        let identifier = identifier.into();
        match self
            .backends
            .iter_mut()
            .find(|backend| backend.identifier == identifier)
        {
            Some(backend) => {
                backend.kind = BackendKind::Custom;
                backend.storage = storage;
            }
            None => self.push(identifier, BackendKind::Custom, storage),
        }
    }

    fn push(&mut self, identifier: String, kind: BackendKind, storage: Arc<dyn StorageBackend>) {
        self.backends.push(Backend {
            identifier,
            kind,
            storage,
        });
    }

    pub fn get(&self, identifier: &str) -> Option<&Backend> {
        self.backends
            .iter()
            .find(|backend| backend.identifier == identifier)
    }

    /// Backends a variant targets; `None` means all of them.
    pub fn select(&self, only: Option<&[String]>) -> Vec<&Backend> {
        self.backends
            .iter()
            .filter(|backend| only.map_or(true, |only| only.contains(&backend.identifier)))
            .collect()
    }

    pub fn as_slice(&self) -> &[Backend] {
        &self.backends
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.backends.iter().map(Backend::identifier)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

fn build(options: &BackendOptions) -> Result<(BackendKind, Arc<dyn StorageBackend>)> {
    let storage: Arc<dyn StorageBackend> = match options {
        BackendOptions::Local(options) => Arc::new(LocalStorage::from_options(options)),
        BackendOptions::S3(options) => Arc::new(S3Storage::from_options(options)?),
        BackendOptions::Rackspace(options) => Arc::new(RackspaceStorage::from_options(options)?),
    };
    Ok((options.kind(), storage))
}
