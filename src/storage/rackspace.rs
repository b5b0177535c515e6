//! Rackspace Cloud Files over its REST API.
//!
//! Authentication is lazy: the first `store`/`delete` trades the API key for a
//! token and the region's storage + CDN endpoints, and the session is reused
//! until a request comes back 401.

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;

use super::{StorageBackend, StorageObject};
use crate::{
    config::RackspaceOptions,
    error::{BackendError, ImagerError},
    utils,
};

const DEFAULT_AUTH_URL: &str = "https://identity.api.rackspacecloud.com/v2.0/tokens";
const STORAGE_SERVICE: &str = "cloudFiles";
const CDN_SERVICE: &str = "cloudFilesCDN";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
const CDN_SSL_URI_HEADER: &str = "X-Cdn-Ssl-Uri";
const CDN_URI_HEADER: &str = "X-Cdn-Uri";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    auth: AuthBody<'a>,
}

#[derive(Debug, Serialize)]
struct AuthBody<'a> {
    #[serde(rename = "RAX-KSKEY:apiKeyCredentials")]
    credentials: ApiKeyCredentials<'a>,
}

#[derive(Debug, Serialize)]
struct ApiKeyCredentials<'a> {
    username: &'a str,
    #[serde(rename = "apiKey")]
    api_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog")]
    service_catalog: Vec<Service>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Service {
    name: String,
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    region: Option<String>,
    #[serde(rename = "publicURL")]
    public_url: String,
}

#[derive(Debug)]
struct Session {
    token: String,
    container_url: String,
    public_base: String,
}

pub struct RackspaceStorage {
    client: Client,
    username: String,
    api_key: String,
    container: String,
    region: Option<String>,
    auth_url: String,
    session: Mutex<Option<Arc<Session>>>,
}

impl RackspaceStorage {
    pub fn from_options(options: &RackspaceOptions) -> Result<Self, ImagerError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                ImagerError::InvalidConfig(format!("HTTP client setup failed: {}", e))
            })?;

        Ok(RackspaceStorage {
            client,
            username: options.username.clone(),
            api_key: options.api_key.clone(),
            container: options.container.clone(),
            region: options.region.clone(),
            auth_url: options
                .auth_url
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTH_URL.to_owned()),
            session: Mutex::new(None),
        })
    }

    /// The lock is held while authenticating: concurrent callers wait for one
    /// login and share its session. A failed login is not cached, so each
    /// waiting caller then tries its own.
    async fn session(&self) -> Result<Arc<Session>, BackendError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(Arc::clone(session));
        }

        let session = Arc::new(self.authenticate().await?);
        *guard = Some(Arc::clone(&session));
        Ok(session)
    }

    async fn forget_session(&self) {
        *self.session.lock().await = None;
    }

    fn endpoint<'a>(&self, catalog: &'a [Service], service: &str) -> Option<&'a Endpoint> {
        let endpoints = &catalog.iter().find(|s| s.name == service)?.endpoints;
        match &self.region {
            Some(region) => endpoints.iter().find(|endpoint| {
                endpoint
                    .region
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(region))
            }),
            None => endpoints.first(),
        }
    }

    #[tracing::instrument(skip(self), fields(username = %self.username))]
    async fn authenticate(&self) -> Result<Session, BackendError> {
        let request = AuthRequest {
            auth: AuthBody {
                credentials: ApiKeyCredentials {
                    username: &self.username,
                    api_key: &self.api_key,
                },
            },
        };

        let response = self
            .client
            .post(&self.auth_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::transport(format!("Could not authenticate: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(
                status.as_u16(),
                format!("Could not authenticate: {} {}", status, body),
            ));
        }

        let auth: AuthResponse = response.json().await.map_err(|e| {
            BackendError::transport(format!("Invalid authentication reply: {}", e))
        })?;

        let storage = self
            .endpoint(&auth.access.service_catalog, STORAGE_SERVICE)
            .ok_or_else(|| {
                BackendError::storage(format!(
                    "No {} endpoint for region {}",
                    STORAGE_SERVICE,
                    self.region.as_deref().unwrap_or("(any)")
                ))
            })?;
        let container_url = utils::join_url(&storage.public_url, &self.container);

        let cdn_base = match self.endpoint(&auth.access.service_catalog, CDN_SERVICE) {
            Some(cdn) => {
                let cdn_container_url = utils::join_url(&cdn.public_url, &self.container);
                self.cdn_uri(&cdn_container_url, &auth.access.token.id)
                    .await
            }
            None => None,
        };

        tracing::info!(container = %self.container, cdn = cdn_base.is_some(), "Authenticated");
        Ok(Session {
            token: auth.access.token.id,
            public_base: cdn_base.unwrap_or_else(|| container_url.clone()),
            container_url,
        })
    }

    /// Public CDN base of the container, if it is CDN-enabled.
    async fn cdn_uri(&self, cdn_container_url: &str, token: &str) -> Option<String> {
        let response = match self
            .client
            .head(cdn_container_url)
            .header(AUTH_TOKEN_HEADER, token)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Container is not CDN enabled");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not look up CDN URI");
                return None;
            }
        };

        [CDN_SSL_URI_HEADER, CDN_URI_HEADER]
            .iter()
            .find_map(|name| response.headers().get(*name)?.to_str().ok())
            .map(str::to_owned)
    }

    async fn failed(&self, action: &str, key: &str, response: reqwest::Response) -> BackendError {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.forget_session().await;
        }
        let body = response.text().await.unwrap_or_default();
        BackendError::from_status(
            status.as_u16(),
            format!("Could not {} file {}: {} {}", action, key, status, body),
        )
    }
}

#[async_trait]
impl StorageBackend for RackspaceStorage {
    #[tracing::instrument(skip(self, object), fields(container = %self.container, key = %object.key))]
    async fn store(&self, object: &StorageObject) -> Result<String, BackendError> {
        let session = self.session().await?;

        let response = self
            .client
            .put(utils::join_url(&session.container_url, &object.key))
            .header(AUTH_TOKEN_HEADER, session.token.as_str())
            .header(CONTENT_TYPE, object.content_type)
            .body(object.data.clone())
            .send()
            .await
            .map_err(|e| {
                BackendError::transport(format!("Could not upload file {}: {}", object.key, e))
            })?;

        if !response.status().is_success() {
            return Err(self.failed("upload", &object.key, response).await);
        }
        Ok(utils::join_url(&session.public_base, &object.key))
    }

    #[tracing::instrument(skip(self), fields(container = %self.container))]
    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let session = self.session().await?;

        let response = self
            .client
            .delete(utils::join_url(&session.container_url, key))
            .header(AUTH_TOKEN_HEADER, session.token.as_str())
            .send()
            .await
            .map_err(|e| {
                BackendError::transport(format!("Could not delete file {}: {}", key, e))
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                tracing::debug!(key, "Object already absent");
                Ok(())
            }
            _ => Err(self.failed("delete", key, response).await),
        }
    }
}

#[cfg(test)]
mod test {
    use super::RackspaceStorage;
    use crate::{
        config::RackspaceOptions,
        error::BackendErrorKind,
        storage::{StorageBackend, StorageObject},
    };
    use axum::{
        http::StatusCode,
        routing::{head, post, put},
        Json, Router,
    };
    use bytes::Bytes;
    use futures_util::future::join_all;
    use serde_json::json;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    async fn listen() -> (tokio::net::TcpListener, String) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        (listener, base)
    }

    fn serve(listener: tokio::net::TcpListener, app: Router) {
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
    }

    fn options(base: &str) -> RackspaceOptions {
        RackspaceOptions {
            username: "xyz123".to_owned(),
            api_key: "secret".to_owned(),
            container: "imager".to_owned(),
            region: Some("dfw".to_owned()),
            auth_url: Some(format!("{}/v2.0/tokens", base)),
        }
    }

    fn object() -> StorageObject {
        StorageObject {
            key: "images/thumb_a.jpg".to_owned(),
            data: Bytes::from_static(b"pixels"),
            content_type: "image/jpeg",
        }
    }

    #[tokio::test]
    async fn should_surface_401_from_authentication() {
        let (listener, base) = listen().await;
        serve(
            listener,
            Router::new().route("/v2.0/tokens", post(|| async { StatusCode::UNAUTHORIZED })),
        );

        let storage = RackspaceStorage::from_options(&options(&base)).unwrap();
        let error = storage.store(&object()).await.unwrap_err();
        assert_eq!(error.status(), Some(401));
        assert_eq!(error.kind(), BackendErrorKind::Unauthorized);

        let error = storage.delete("a.jpg").await.unwrap_err();
        assert_eq!(error.status(), Some(401));
    }

    #[tokio::test]
    async fn should_authenticate_once_for_concurrent_stores() {
        let (listener, base) = listen().await;
        let logins = Arc::new(AtomicUsize::new(0));
        let catalog = json!({
            "access": {
                "token": { "id": "token-1" },
                "serviceCatalog": [{
                    "name": "cloudFiles",
                    "endpoints": [{ "region": "DFW", "publicURL": format!("{}/storage", base) }]
                }]
            }
        });

        let counter = Arc::clone(&logins);
        let app = Router::new()
            .route(
                "/v2.0/tokens",
                post(move || {
                    let catalog = catalog.clone();
                    counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Json(catalog)
                    }
                }),
            )
            .route("/storage/imager/{*key}", put(|| async { StatusCode::CREATED }));
        serve(listener, app);

        let storage = RackspaceStorage::from_options(&options(&base)).unwrap();
        let objects: Vec<StorageObject> = (0..4)
            .map(|i| StorageObject {
                key: format!("images/{}.jpg", i),
                ..object()
            })
            .collect();
        let results = join_all(objects.iter().map(|object| storage.store(object))).await;

        assert!(results.iter().all(Result::is_ok));
        let uri = results[3].as_ref().unwrap();
        assert_eq!(uri, &format!("{}/storage/imager/images/3.jpg", base));
        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_store_through_cdn_and_ignore_missing_deletes() {
        let (listener, base) = listen().await;
        let catalog = json!({
            "access": {
                "token": { "id": "token-1" },
                "serviceCatalog": [
                    {
                        "name": "cloudFiles",
                        "endpoints": [
                            { "region": "ORD", "publicURL": format!("{}/ord", base) },
                            { "region": "DFW", "publicURL": format!("{}/storage", base) }
                        ]
                    },
                    {
                        "name": "cloudFilesCDN",
                        "endpoints": [{ "region": "DFW", "publicURL": format!("{}/cdn", base) }]
                    }
                ]
            }
        });

        let app = Router::new()
            .route(
                "/v2.0/tokens",
                post(move || {
                    let catalog = catalog.clone();
                    async move { Json(catalog) }
                }),
            )
            .route(
                "/storage/imager/{*key}",
                put(|| async { StatusCode::CREATED }).delete(|| async { StatusCode::NOT_FOUND }),
            )
            .route(
                "/cdn/imager",
                head(|| async {
                    (
                        StatusCode::NO_CONTENT,
                        [("X-Cdn-Ssl-Uri", "https://abc.ssl.cf1.rackcdn.com")],
                    )
                }),
            );
        serve(listener, app);

        let storage = RackspaceStorage::from_options(&options(&base)).unwrap();
        let uri = storage.store(&object()).await.unwrap();
        assert_eq!(uri, "https://abc.ssl.cf1.rackcdn.com/images/thumb_a.jpg");

        storage.delete("images/thumb_a.jpg").await.unwrap();
    }
}
