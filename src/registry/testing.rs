//! In-memory stand-ins for the registry control plane, identity layer and image engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use aws_sdk_ecr::types::AuthorizationData;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use futures::StreamExt;

use super::catalog::{CatalogProvider, ImageReference, RegistryCatalog, Repository};
use super::config::SyncConfig;
use super::credentials::{credential_from_authorization, CredentialProvider, RegistryCredential};
use super::engine::{ImageEngine, ProgressEvent, ProgressStream, RegistryAuth};
use super::error::{EngineError, LookupError, SyncError};
use super::pagination::Page;
use super::reference::FullyQualifiedReference;

fn page_index(cursor: Option<String>) -> usize {
    cursor
        .and_then(|c| c.strip_prefix("page-").and_then(|n| n.parse().ok()))
        .unwrap_or(0)
}

fn next_cursor(index: usize, pages: usize) -> Option<String> {
    (index + 1 < pages).then(|| format!("page-{}", index + 1))
}

/// Catalog serving fixed pages, cursors are `page-{n}`
#[derive(Default)]
pub struct FakeCatalog {
    repository_pages: Vec<Vec<String>>,
    image_pages: HashMap<String, Vec<Vec<String>>>,
    failing_image_page: Option<usize>,
    calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository_pages(mut self, pages: Vec<Vec<&str>>) -> Self {
        self.repository_pages = pages
            .into_iter()
            .map(|p| p.into_iter().map(String::from).collect())
            .collect();
        self
    }

    pub fn with_image_pages(mut self, repository: &str, pages: Vec<Vec<&str>>) -> Self {
        self.image_pages.insert(
            repository.to_string(),
            pages
                .into_iter()
                .map(|p| p.into_iter().map(String::from).collect())
                .collect(),
        );
        self
    }

    pub fn failing_image_page(mut self, index: usize) -> Self {
        self.failing_image_page = Some(index);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryCatalog for FakeCatalog {
    async fn repositories_page(
        &self,
        cursor: Option<String>,
    ) -> Result<Page<Repository>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index = page_index(cursor);
        let items = self
            .repository_pages
            .get(index)
            .map(|names| {
                names
                    .iter()
                    .map(|name| Repository { name: name.clone() })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Page {
            items,
            next_cursor: next_cursor(index, self.repository_pages.len()),
        })
    }

    async fn images_page(
        &self,
        repository: &str,
        cursor: Option<String>,
    ) -> Result<Page<ImageReference>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pages = self
            .image_pages
            .get(repository)
            .ok_or_else(|| LookupError::not_found(format!("Repository '{}' not found", repository)))?;

        let index = page_index(cursor);
        if self.failing_image_page == Some(index) {
            return Err(LookupError::unavailable("ThrottlingException: rate exceeded"));
        }

        let items = pages
            .get(index)
            .map(|tags| {
                tags.iter()
                    .map(|tag| ImageReference {
                        digest: format!("sha256:{}", tag),
                        tag: tag.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Page {
            items,
            next_cursor: next_cursor(index, pages.len()),
        })
    }
}

/// Provider handing out one shared [`FakeCatalog`] for every region
pub struct FakeCatalogProvider {
    catalog: Arc<FakeCatalog>,
    regions: Mutex<Vec<String>>,
}

impl FakeCatalogProvider {
    pub fn new(catalog: FakeCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            regions: Mutex::new(Vec::new()),
        }
    }

    pub fn opened_regions(&self) -> Vec<String> {
        self.regions.lock().unwrap().clone()
    }
}

struct SharedCatalog(Arc<FakeCatalog>);

#[async_trait]
impl RegistryCatalog for SharedCatalog {
    async fn repositories_page(
        &self,
        cursor: Option<String>,
    ) -> Result<Page<Repository>, LookupError> {
        self.0.repositories_page(cursor).await
    }

    async fn images_page(
        &self,
        repository: &str,
        cursor: Option<String>,
    ) -> Result<Page<ImageReference>, LookupError> {
        self.0.images_page(repository, cursor).await
    }
}

#[async_trait]
impl CatalogProvider for FakeCatalogProvider {
    async fn open(
        &self,
        region: &str,
        _config: &SyncConfig,
    ) -> Result<Box<dyn RegistryCatalog>, SyncError> {
        if region.trim().is_empty() {
            return Err(SyncError::configuration("region must not be empty"));
        }
        self.regions.lock().unwrap().push(region.to_string());
        Ok(Box::new(SharedCatalog(self.catalog.clone())))
    }
}

/// Identity layer returning a fixed set of authorization entries
pub struct FakeCredentials {
    /// Plain `principal:secret` payloads, encoded on the way out
    entries: Vec<Option<String>>,
    acquisitions: AtomicUsize,
}

impl FakeCredentials {
    pub fn ok(payload: &str) -> Self {
        Self::with_entries(vec![Some(payload)])
    }

    pub fn with_entries(entries: Vec<Option<&str>>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| e.map(String::from)).collect(),
            acquisitions: AtomicUsize::new(0),
        }
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for FakeCredentials {
    async fn acquire(
        &self,
        _region: &str,
        config: &SyncConfig,
    ) -> Result<RegistryCredential, SyncError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let data: Vec<AuthorizationData> = self
            .entries
            .iter()
            .map(|entry| {
                let mut builder = AuthorizationData::builder();
                if let Some(payload) = entry {
                    builder = builder.authorization_token(URL_SAFE.encode(payload));
                }
                builder.build()
            })
            .collect();
        credential_from_authorization(&data, &config.username)
    }
}

/// `X-Registry-Auth` value the daemon receives for `auth`: base64url of its JSON form
pub fn registry_auth_header(auth: RegistryAuth) -> String {
    let credentials = auth.into_docker_credentials();
    let json = serde_json::json!({
        "username": credentials.username,
        "password": credentials.password,
        "serveraddress": credentials.serveraddress,
    });
    URL_SAFE.encode(json.to_string())
}

/// Image engine with a local image store and a remote registry, both keyed by full reference
pub struct FakeEngine {
    remote: Mutex<HashMap<String, String>>,
    local: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
    auth_headers: Mutex<Vec<String>>,
    consumed: Arc<AtomicUsize>,
    events_per_transfer: usize,
    push_error: Option<String>,
    tag_error: Option<String>,
    stall_pull: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            remote: Mutex::new(HashMap::new()),
            local: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            auth_headers: Mutex::new(Vec::new()),
            consumed: Arc::new(AtomicUsize::new(0)),
            events_per_transfer: 3,
            push_error: None,
            tag_error: None,
            stall_pull: false,
        }
    }

    pub fn with_remote_image(self, reference: &str, digest: &str) -> Self {
        self.remote
            .lock()
            .unwrap()
            .insert(reference.to_string(), digest.to_string());
        self
    }

    pub fn failing_push(mut self, message: &str) -> Self {
        self.push_error = Some(message.to_string());
        self
    }

    pub fn failing_tag(mut self, message: &str) -> Self {
        self.tag_error = Some(message.to_string());
        self
    }

    pub fn stalling_pull(mut self) -> Self {
        self.stall_pull = true;
        self
    }

    pub fn events_per_transfer(&self) -> usize {
        self.events_per_transfer
    }

    pub fn consumed_events(&self) -> usize {
        self.consumed.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn auth_headers(&self) -> Vec<String> {
        self.auth_headers.lock().unwrap().clone()
    }

    pub fn remote_digest(&self, reference: &str) -> Option<String> {
        self.remote.lock().unwrap().get(reference).cloned()
    }

    /// Number of tags stored remotely under `repository_path`
    pub fn remote_tags(&self, repository_path: &str) -> usize {
        let prefix = format!("{}:", repository_path);
        self.remote
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .count()
    }

    pub fn has_local(&self, reference: &str) -> bool {
        self.local.lock().unwrap().contains_key(reference)
    }

    fn record(&self, call: String, auth: Option<RegistryAuth>) {
        self.calls.lock().unwrap().push(call);
        if let Some(auth) = auth {
            self.auth_headers
                .lock()
                .unwrap()
                .push(registry_auth_header(auth));
        }
    }

    fn progress<'a>(
        &self,
        status: &str,
        failure: Option<String>,
    ) -> ProgressStream<'a> {
        let mut events: Vec<Result<ProgressEvent, EngineError>> = (0..self.events_per_transfer)
            .map(|i| {
                Ok(ProgressEvent {
                    id: Some(format!("layer{}", i)),
                    status: status.to_string(),
                    progress: None,
                })
            })
            .collect();
        if let Some(message) = failure {
            events.truncate(1);
            events.push(Err(EngineError::Reported(message)));
        }

        let consumed = Arc::clone(&self.consumed);
        futures::stream::iter(events)
            .inspect(move |_| {
                consumed.fetch_add(1, Ordering::SeqCst);
            })
            .boxed()
    }
}

#[async_trait]
impl ImageEngine for FakeEngine {
    fn pull<'a>(
        &'a self,
        reference: &'a FullyQualifiedReference,
        auth: RegistryAuth,
    ) -> ProgressStream<'a> {
        let key = reference.to_string();
        self.record(format!("pull {}", key), Some(auth));

        if self.stall_pull {
            return futures::stream::pending().boxed();
        }

        let digest = self.remote.lock().unwrap().get(&key).cloned();
        match digest {
            Some(digest) => {
                self.local.lock().unwrap().insert(key, digest);
                self.progress("Pull complete", None)
            }
            None => futures::stream::iter(vec![Err(EngineError::Reported(format!(
                "manifest for {} not found",
                key
            )))])
            .boxed(),
        }
    }

    async fn tag(
        &self,
        source: &FullyQualifiedReference,
        destination: &FullyQualifiedReference,
    ) -> Result<(), EngineError> {
        self.record(format!("tag {} {}", source, destination), None);
        if let Some(message) = &self.tag_error {
            return Err(EngineError::Reported(message.clone()));
        }

        let mut local = self.local.lock().unwrap();
        let digest = local
            .get(&source.to_string())
            .cloned()
            .ok_or_else(|| EngineError::Reported(format!("No such image: {}", source)))?;
        local.insert(destination.to_string(), digest);
        Ok(())
    }

    fn push<'a>(
        &'a self,
        reference: &'a FullyQualifiedReference,
        auth: RegistryAuth,
    ) -> ProgressStream<'a> {
        let key = reference.to_string();
        self.record(format!("push {}", key), Some(auth));

        if let Some(message) = &self.push_error {
            return self.progress("Pushing", Some(message.clone()));
        }

        let digest = self.local.lock().unwrap().get(&key).cloned();
        match digest {
            Some(digest) => {
                self.remote.lock().unwrap().insert(key, digest);
                self.progress("Pushed", None)
            }
            None => futures::stream::iter(vec![Err(EngineError::Reported(format!(
                "An image does not exist locally with the tag: {}",
                key
            )))])
            .boxed(),
        }
    }
}
