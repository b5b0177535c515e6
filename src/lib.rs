//! Upload images to local disk, S3 and Rackspace Cloud Files.
//!
//! A JSON config names *variants* (sets of presets such as `thumb` or `mini`)
//! and *storage* backends. An [`Imager`] built from it stores every preset of
//! every uploaded file on each backend a variant targets, and removes them
//! again by name.
//!
//! ```no_run
//! # async fn run() -> imager::Result<()> {
//! let config = imager::Config::from_file("imager.json")?;
//! let imager = imager::Imager::new(config, ["Local", "S3"])?;
//!
//! let report = imager.upload(vec!["photo.jpg"], Some("items")).await?;
//! let (primary_uri, uploaded) = report.into_result()?;
//!
//! let names: Vec<String> = uploaded.into_iter().map(|u| u.name).collect();
//! imager.remove(names, Some("items")).await?;
//! # let _ = primary_uri;
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod config;
pub mod error;
pub mod imager;
pub mod registry;
pub mod storage;
pub mod transform;
pub mod utils;
pub mod variant;

pub use asset::{AssetList, NameList, RemovalResult, SourceAsset, StoredObject, UploadResult};
pub use config::{BackendOptions, Config};
pub use error::{BackendError, BackendErrorKind, ImagerError, Result};
pub use imager::{Imager, RemovalReport, UploadReport};
pub use registry::{Backend, BackendRegistry, BackendSelector};
pub use storage::{BackendKind, StorageBackend, StorageObject};
pub use transform::{Passthrough, Transform};
pub use variant::{Preset, VariantRegistry, VariantSpec};
