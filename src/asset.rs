//! Inputs and per-asset outcomes of uploads and removals.

use serde::Serialize;
use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use crate::error::{BackendError, ImagerError, Result};

/// A file handed to `upload`, either a bare path or a file already received
/// by a host HTTP layer (temp path + the name the client sent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceAsset {
    Path(PathBuf),
    Upload { path: PathBuf, name: String },
}

impl SourceAsset {
    pub fn upload(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        SourceAsset::Upload {
            path: path.into(),
            name: name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            SourceAsset::Path(path) => path,
            SourceAsset::Upload { path, .. } => path,
        }
    }

    /// Reduce to a path plus the name used for the stored objects.
    pub fn normalize(self) -> Result<LocalAsset> {
        match self {
            SourceAsset::Path(path) => {
                let original_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        ImagerError::io(
                            &path,
                            io::Error::new(ErrorKind::InvalidInput, "path has no file name"),
                        )
                    })?;
                Ok(LocalAsset {
                    path,
                    original_name,
                })
            }
            SourceAsset::Upload { path, name } => {
                // Browsers may send a full client-side path.
                let original_name = name
                    .rsplit(['/', '\\'])
                    .next()
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned)
                    .ok_or_else(|| {
                        ImagerError::io(
                            &path,
                            io::Error::new(ErrorKind::InvalidInput, "upload has no file name"),
                        )
                    })?;
                Ok(LocalAsset {
                    path,
                    original_name,
                })
            }
        }
    }
}

impl From<&str> for SourceAsset {
    fn from(path: &str) -> Self {
        SourceAsset::Path(PathBuf::from(path))
    }
}

impl From<String> for SourceAsset {
    fn from(path: String) -> Self {
        SourceAsset::Path(PathBuf::from(path))
    }
}

impl From<PathBuf> for SourceAsset {
    fn from(path: PathBuf) -> Self {
        SourceAsset::Path(path)
    }
}

impl From<&Path> for SourceAsset {
    fn from(path: &Path) -> Self {
        SourceAsset::Path(path.to_path_buf())
    }
}

impl From<&PathBuf> for SourceAsset {
    fn from(path: &PathBuf) -> Self {
        SourceAsset::Path(path.clone())
    }
}

/// One or many assets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetList(Vec<SourceAsset>);

impl AssetList {
    pub fn empty() -> Self {
        AssetList(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<SourceAsset> {
        self.0
    }
}

impl From<SourceAsset> for AssetList {
    fn from(asset: SourceAsset) -> Self {
        AssetList(vec![asset])
    }
}

impl From<&str> for AssetList {
    fn from(path: &str) -> Self {
        AssetList(vec![path.into()])
    }
}

impl From<String> for AssetList {
    fn from(path: String) -> Self {
        AssetList(vec![path.into()])
    }
}

impl From<PathBuf> for AssetList {
    fn from(path: PathBuf) -> Self {
        AssetList(vec![path.into()])
    }
}

impl<T: Into<SourceAsset>> From<Vec<T>> for AssetList {
    fn from(assets: Vec<T>) -> Self {
        AssetList(assets.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<SourceAsset>, const N: usize> From<[T; N]> for AssetList {
    fn from(assets: [T; N]) -> Self {
        AssetList(assets.into_iter().map(Into::into).collect())
    }
}

/// Remote names handed to `remove`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameList(Vec<String>);

impl NameList {
    pub fn empty() -> Self {
        NameList(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for NameList {
    fn from(name: &str) -> Self {
        NameList(vec![name.to_owned()])
    }
}

impl From<String> for NameList {
    fn from(name: String) -> Self {
        NameList(vec![name])
    }
}

impl<T: Into<String>> From<Vec<T>> for NameList {
    fn from(names: Vec<T>) -> Self {
        NameList(names.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<String>, const N: usize> From<[T; N]> for NameList {
    fn from(names: [T; N]) -> Self {
        NameList(names.into_iter().map(Into::into).collect())
    }
}

/// A normalized source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAsset {
    pub path: PathBuf,
    pub original_name: String,
}

impl LocalAsset {
    /// Fail unless the path points at a readable regular file.
    pub fn check(&self) -> Result<()> {
        let metadata = fs::metadata(&self.path).map_err(|e| ImagerError::io(&self.path, e))?;
        if !metadata.is_file() {
            return Err(ImagerError::io(
                &self.path,
                io::Error::new(ErrorKind::InvalidInput, "not a regular file"),
            ));
        }
        fs::File::open(&self.path).map_err(|e| ImagerError::io(&self.path, e))?;
        Ok(())
    }

    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.original_name)
            .extension()
            .and_then(|extension| extension.to_str())
    }
}

/// One object written to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub preset: Option<String>,
    pub key: String,
    pub uri: String,
}

/// An asset stored on one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub original_name: String,
    /// Name to hand back to `remove`.
    pub name: String,
    pub backend: String,
    /// URI of the first stored object.
    pub uri: String,
    /// Objects actually written; shorter than the variant's renditions when a store failed.
    pub objects: Vec<StoredObject>,
}

/// Outcome of removing one name from one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalResult {
    pub name: String,
    pub backend: String,
    pub error: Option<BackendError>,
}
