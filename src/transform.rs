//! Hook for the pixel work behind presets.
//!
//! Resizing and cropping happen outside this crate. A [`Transform`] receives the
//! source file plus the preset and returns the bytes to store.

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    asset::LocalAsset,
    error::{ImagerError, Result},
    variant::Preset,
};

#[async_trait]
pub trait Transform: Send + Sync {
    /// Render `asset` for `preset`; `None` means the untouched original.
    async fn render(
        &self,
        asset: &LocalAsset,
        preset: Option<&Preset>,
        format: Option<&str>,
    ) -> Result<Bytes>;
}

/// Stores every rendition as the unmodified source bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl Transform for Passthrough {
    async fn render(
        &self,
        asset: &LocalAsset,
        _preset: Option<&Preset>,
        _format: Option<&str>,
    ) -> Result<Bytes> {
        let data = tokio::fs::read(&asset.path)
            .await
            .map_err(|e| ImagerError::io(&asset.path, e))?;
        Ok(Bytes::from(data))
    }
}
