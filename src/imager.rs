//! The upload/remove engine.
//!
//! An [`Imager`] is built once from a [`Config`] and a backend selector. Every
//! `upload` resolves a variant, checks all local files, then stores each asset's
//! renditions on every backend the variant targets. `remove` deletes the same
//! renditions by name.

use futures_util::{
    future::join_all,
    stream::{self, StreamExt},
};
use serde_json::Value;
use std::sync::Arc;

use crate::{
    asset::{AssetList, LocalAsset, NameList, RemovalResult, StoredObject, UploadResult},
    config::Config,
    error::{ImagerError, Result},
    registry::{Backend, BackendRegistry, BackendSelector},
    storage::StorageObject,
    transform::{Passthrough, Transform},
    utils,
    variant::{Variant, VariantRegistry},
};

/// Aggregated outcome of one `upload` call.
///
/// On failure `error` holds the first failing store in dispatch order and
/// `uploaded` keeps whatever was written, including assets whose later
/// renditions failed (their `objects` list only what was stored).
#[derive(Debug, Default)]
pub struct UploadReport {
    pub error: Option<ImagerError>,
    /// URI of the first uploaded asset on the first backend; unset on failure.
    pub primary_uri: Option<String>,
    pub uploaded: Vec<UploadResult>,
}

impl UploadReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<(Option<String>, Vec<UploadResult>)> {
        match self.error {
            Some(error) => Err(error),
            None => Ok((self.primary_uri, self.uploaded)),
        }
    }
}

/// Aggregated outcome of one `remove` call. Absent objects never count as errors.
#[derive(Debug, Default)]
pub struct RemovalReport {
    pub error: Option<ImagerError>,
    pub removed: Vec<RemovalResult>,
}

impl RemovalReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

struct PendingAsset {
    asset: LocalAsset,
    name: String,
}

struct Rendered {
    preset: Option<String>,
    object: StorageObject,
}

/// What one asset left on one backend, and what stopped it.
struct Stored {
    uploaded: Option<UploadResult>,
    error: Option<ImagerError>,
}

pub struct Imager {
    config: Config,
    variants: VariantRegistry,
    backends: BackendRegistry,
    transform: Arc<dyn Transform>,
}

impl Imager {
    /// Build the engine and one client per selected backend.
    pub fn new(config: Config, selector: impl Into<BackendSelector>) -> Result<Self> {
        config.validate()?;
        let backends = BackendRegistry::from_config(&config, &selector.into())?;
        Imager::with_registry(config, backends)
    }

    /// Like [`Imager::new`], starting from an unchecked JSON document.
    pub fn from_value(config: &Value, selector: impl Into<BackendSelector>) -> Result<Self> {
        Imager::new(Config::from_value(config)?, selector)
    }

    /// Build the engine around backends the caller assembled.
    pub fn with_registry(config: Config, backends: BackendRegistry) -> Result<Self> {
        let variants =
            VariantRegistry::new(config.variants.clone(), config.default_variant.clone())?;
        Ok(Imager {
            config,
            variants,
            backends,
            transform: Arc::new(Passthrough),
        })
    }

    pub fn with_transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transform = Arc::new(transform);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn variants(&self) -> &VariantRegistry {
        &self.variants
    }

    pub fn backends(&self) -> &[Backend] {
        self.backends.as_slice()
    }

    /// Variant used when `upload`/`remove` get `None`, if one is configured.
    pub fn default_variant(&self) -> Option<&str> {
        self.variants.default_variant()
    }

    fn targets(&self, variant: &Variant) -> Result<Vec<&Backend>> {
        let targets = self.backends.select(variant.backends());
        if targets.is_empty() {
            return Err(ImagerError::NoBackends(variant.name().to_owned()));
        }
        Ok(targets)
    }

    fn object_key(&self, name: &str) -> String {
        utils::object_key(self.config.upload_directory.as_deref(), name)
    }

    fn concurrency(&self, jobs: usize) -> usize {
        self.config.concurrency.unwrap_or(jobs).max(1)
    }

    /// Upload `assets` under `variant`.
    ///
    /// Returns `Err` only for problems found before anything is sent: an
    /// unresolvable variant or a local file that cannot be read. Backend
    /// failures are reported through [`UploadReport::error`].
    #[tracing::instrument(skip(self, assets))]
    pub async fn upload(
        &self,
        assets: impl Into<AssetList>,
        variant: Option<&str>,
    ) -> Result<UploadReport> {
        let variant = self.variants.resolve(variant)?;
        let assets = assets.into().into_inner();
        if assets.is_empty() {
            tracing::debug!("No files to upload");
            return Ok(UploadReport::default());
        }
        let targets = self.targets(variant)?;

        let mut pending = Vec::with_capacity(assets.len());
        for asset in assets {
            let asset = asset.normalize()?;
            asset.check()?;
            let name = if variant.keep_names() {
                asset.original_name.clone()
            } else {
                utils::random_name(asset.extension())
            };
            utils::check_name(&name)?;
            pending.push(PendingAsset { asset, name });
        }

        tracing::info!(
            variant = variant.name(),
            assets = pending.len(),
            backends = targets.len(),
            "Uploading"
        );

        let uploads: Vec<_> = pending
            .iter()
            .map(|pending| self.upload_asset(variant, &targets, pending))
            .collect();
        let outcomes: Vec<Result<Vec<Stored>>> = stream::iter(uploads)
            .buffered(self.concurrency(pending.len()))
            .collect()
            .await;

        let mut report = UploadReport::default();
        for outcome in outcomes {
            let stored = match outcome {
                Ok(stored) => stored,
                Err(e) => vec![Stored {
                    uploaded: None,
                    error: Some(e),
                }],
            };
            for Stored { uploaded, error } in stored {
                report.uploaded.extend(uploaded);
                match error {
                    Some(e) if report.error.is_none() => report.error = Some(e),
                    Some(e) => tracing::warn!(error = %e, "Additional upload failure"),
                    None => {}
                }
            }
        }

        match &report.error {
            None => report.primary_uri = report.uploaded.first().map(|u| u.uri.clone()),
            Some(e) => {
                tracing::warn!(error = %e, uploaded = report.uploaded.len(), "Upload failed")
            }
        }
        Ok(report)
    }

    /// Render every object of one asset, then store them on all targets at once.
    async fn upload_asset(
        &self,
        variant: &Variant,
        targets: &[&Backend],
        pending: &PendingAsset,
    ) -> Result<Vec<Stored>> {
        let mut rendered = Vec::new();
        for rendition in variant.renditions(&pending.name) {
            let data = self
                .transform
                .render(&pending.asset, rendition.preset.as_ref(), variant.format())
                .await?;
            rendered.push(Rendered {
                preset: rendition.preset.map(|preset| preset.name),
                object: StorageObject {
                    key: self.object_key(&rendition.name),
                    content_type: utils::content_type(&rendition.name),
                    data,
                },
            });
        }

        let stores: Vec<_> = targets
            .iter()
            .map(|backend| Self::store_on(backend, pending, &rendered))
            .collect();
        Ok(join_all(stores).await)
    }

    /// Store renditions in order, stopping at the first failure.
    async fn store_on(backend: &Backend, pending: &PendingAsset, rendered: &[Rendered]) -> Stored {
        let mut objects = Vec::with_capacity(rendered.len());
        let mut error = None;
        for Rendered { preset, object } in rendered {
            match backend.storage().store(object).await {
                Ok(uri) => objects.push(StoredObject {
                    preset: preset.clone(),
                    key: object.key.clone(),
                    uri,
                }),
                Err(e) => {
                    error = Some(ImagerError::backend(backend.identifier(), e));
                    break;
                }
            }
        }

        if error.is_some() && !objects.is_empty() {
            tracing::warn!(
                backend = backend.identifier(),
                name = %pending.name,
                stored = objects.len(),
                "Upload stopped after partial store"
            );
        }
        let uploaded = objects.first().map(|o| o.uri.clone()).map(|uri| UploadResult {
            original_name: pending.asset.original_name.clone(),
            name: pending.name.clone(),
            backend: backend.identifier().to_owned(),
            uri,
            objects,
        });
        Stored { uploaded, error }
    }

    /// Upload and hand the outcome to `callback` exactly once.
    pub async fn upload_with<F>(
        &self,
        assets: impl Into<AssetList>,
        variant: Option<&str>,
        callback: F,
    ) -> Result<()>
    where
        F: FnOnce(Option<ImagerError>, Option<String>, Vec<UploadResult>),
    {
        let report = self.upload(assets, variant).await?;
        callback(report.error, report.primary_uri, report.uploaded);
        Ok(())
    }

    /// Delete every rendition of `names` from the variant's backends.
    ///
    /// Objects that are already gone are not errors.
    #[tracing::instrument(skip(self, names))]
    pub async fn remove(
        &self,
        names: impl Into<NameList>,
        variant: Option<&str>,
    ) -> Result<RemovalReport> {
        let variant = self.variants.resolve(variant)?;
        let names = names.into().into_inner();
        if names.is_empty() {
            tracing::debug!("No files to remove");
            return Ok(RemovalReport::default());
        }
        let targets = self.targets(variant)?;
        for name in &names {
            utils::check_name(name)?;
        }

        let removals: Vec<_> = names
            .iter()
            .flat_map(|name| {
                targets
                    .iter()
                    .map(move |backend| self.remove_from(variant, backend, name))
            })
            .collect();
        let limit = self.concurrency(removals.len());

        let removed: Vec<RemovalResult> = stream::iter(removals)
            .buffered(limit)
            .collect()
            .await;

        let error = removed.iter().find_map(|result| {
            let error = result.error.clone()?;
            Some(ImagerError::backend(result.backend.clone(), error))
        });
        if let Some(e) = &error {
            tracing::warn!(error = %e, "Removal failed");
        }
        Ok(RemovalReport { error, removed })
    }

    async fn remove_from(&self, variant: &Variant, backend: &Backend, name: &str) -> RemovalResult {
        let mut error = None;
        for rendition in variant.renditions(name) {
            let key = self.object_key(&rendition.name);
            match backend.storage().delete(&key).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    tracing::debug!(backend = backend.identifier(), %key, "Already absent");
                }
                Err(e) => {
                    tracing::warn!(
                        backend = backend.identifier(),
                        %key,
                        error = %e,
                        "Could not delete"
                    );
                    error.get_or_insert(e);
                }
            }
        }

        RemovalResult {
            name: name.to_owned(),
            backend: backend.identifier().to_owned(),
            error,
        }
    }

    /// Remove and report to `callback`; with `None` the outcome is only logged.
    pub async fn remove_with<F>(
        &self,
        names: impl Into<NameList>,
        variant: Option<&str>,
        callback: Option<F>,
    ) -> Result<()>
    where
        F: FnOnce(Option<ImagerError>),
    {
        let report = self.remove(names, variant).await?;
        if let Some(callback) = callback {
            callback(report.error);
        }
        Ok(())
    }
}
