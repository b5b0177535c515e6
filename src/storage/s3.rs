use async_trait::async_trait;
use rusoto_core::{credential::StaticProvider, HttpClient, Region, RusotoError};
use rusoto_s3::{DeleteObjectRequest, PutObjectRequest, S3Client, S3};
use std::error::Error;

use super::{StorageBackend, StorageObject};
use crate::{
    config::S3Options,
    error::{BackendError, BackendErrorKind, ImagerError},
    utils,
};

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_ACL: &str = "public-read";

#[derive(Clone)]
pub struct S3Storage {
    bucket_name: String,
    acl: String,
    base_url: String,
    s3_client: S3Client,
}

impl S3Storage {
    /// Build a client from a `storage` entry. No request is sent.
    pub fn from_options(options: &S3Options) -> Result<Self, ImagerError> {
        let region = region(options)?;

        let s3_client = match (&options.key, &options.secret) {
            (Some(key), Some(secret)) => {
                let dispatcher = HttpClient::new().map_err(|e| {
                    ImagerError::InvalidConfig(format!("S3 TLS setup failed: {}", e))
                })?;
                let credentials = StaticProvider::new_minimal(key.clone(), secret.clone());
                S3Client::new_with(dispatcher, credentials, region)
            }
            (None, None) => S3Client::new(region),
            _ => {
                return Err(ImagerError::InvalidConfig(
                    "S3 key and secret must be given together".to_owned(),
                ))
            }
        };

        Ok(S3Storage {
            bucket_name: options.bucket.clone(),
            acl: options.acl.clone().unwrap_or_else(|| DEFAULT_ACL.to_owned()),
            base_url: base_url(options),
            s3_client,
        })
    }
}

fn region(options: &S3Options) -> Result<Region, ImagerError> {
    let name = options
        .region
        .clone()
        .unwrap_or_else(|| DEFAULT_REGION.to_owned());

    match &options.endpoint {
        Some(endpoint) => Ok(Region::Custom {
            name,
            endpoint: endpoint.clone(),
        }),
        None => name
            .parse::<Region>()
            .map_err(|e| ImagerError::InvalidConfig(format!("S3 region {}: {}", name, e))),
    }
}

fn base_url(options: &S3Options) -> String {
    match (&options.public_url, &options.endpoint) {
        (Some(public_url), _) => public_url.clone(),
        (None, Some(endpoint)) => utils::join_url(endpoint, &options.bucket),
        (None, None) => format!("https://{}.s3.amazonaws.com", options.bucket),
    }
}

fn backend_error<E: Error + 'static>(action: &str, key: &str, e: RusotoError<E>) -> BackendError {
    match e {
        RusotoError::Unknown(response) => BackendError::from_status(
            response.status.as_u16(),
            format!(
                "Could not {} file {}: {}",
                action,
                key,
                response.body_as_str()
            ),
        ),
        RusotoError::Credentials(e) => BackendError::new(
            BackendErrorKind::Unauthorized,
            format!("Could not {} file {}: {}", action, key, e),
        ),
        RusotoError::HttpDispatch(e) => {
            BackendError::transport(format!("Could not {} file {}: {}", action, key, e))
        }
        e => BackendError::storage(format!("Could not {} file {}: {}", action, key, e)),
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    #[tracing::instrument(skip(self, object), fields(bucket = %self.bucket_name, key = %object.key))]
    async fn store(&self, object: &StorageObject) -> Result<String, BackendError> {
        let put_req = PutObjectRequest {
            bucket: self.bucket_name.to_string(),
            key: object.key.to_string(),
            body: Some(object.data.to_vec().into()),
            content_type: Some(object.content_type.to_owned()),
            content_length: Some(object.data.len() as i64),
            acl: Some(self.acl.clone()),
            ..Default::default()
        };

        match self.s3_client.put_object(put_req).await {
            Ok(_) => Ok(utils::join_url(&self.base_url, &object.key)),
            Err(e) => Err(backend_error("upload", &object.key, e)),
        }
    }

    #[tracing::instrument(skip(self), fields(bucket = %self.bucket_name))]
    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let delete_req = DeleteObjectRequest {
            bucket: self.bucket_name.to_string(),
            key: key.to_string(),
            ..Default::default()
        };

        match self.s3_client.delete_object(delete_req).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let error = backend_error("delete", key, e);
                if error.is_not_found() {
                    tracing::debug!(key, "Object already absent");
                    return Ok(());
                }
                Err(error)
            }
        }
    }
}
