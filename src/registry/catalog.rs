use async_trait::async_trait;
use aws_sdk_ecr::types::{ListImagesFilter, TagStatus};
use aws_sdk_ecr::Client as EcrClient;
use tracing::info;

use super::aws::{ecr_client, format_sdk_error};
use super::config::{IdentitySource, SyncConfig, TagFilter};
use super::error::{LookupError, Stage, SyncError};
use super::pagination::{enumerate, Page};
use super::scope::OperationScope;

/// A repository in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
}

/// One tagged image. Several of these may share a digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub digest: String,
    pub tag: String,
}

/// Paginated listing operations of the registry control plane
#[async_trait]
pub trait RegistryCatalog: Send + Sync {
    async fn repositories_page(
        &self,
        cursor: Option<String>,
    ) -> Result<Page<Repository>, LookupError>;

    async fn images_page(
        &self,
        repository: &str,
        cursor: Option<String>,
    ) -> Result<Page<ImageReference>, LookupError>;
}

/// Opens a catalog for a region, one per request
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn open(
        &self,
        region: &str,
        config: &SyncConfig,
    ) -> Result<Box<dyn RegistryCatalog>, SyncError>;
}

/// All repositories, sorted ascending by name
pub async fn list_repositories(
    catalog: &dyn RegistryCatalog,
    scope: &OperationScope,
) -> Result<Vec<Repository>, SyncError> {
    let mut repositories = enumerate(
        Stage::ListingRepositories,
        scope,
        |cursor| catalog.repositories_page(cursor),
        |_| true,
    )
    .await?;

    sort_repositories(&mut repositories);
    Ok(repositories)
}

/// Tagged images of a repository matching `filter`, sorted descending by raw tag
pub async fn list_images(
    catalog: &dyn RegistryCatalog,
    repository: &str,
    filter: &TagFilter,
    scope: &OperationScope,
) -> Result<Vec<ImageReference>, SyncError> {
    if repository.trim().is_empty() {
        return Err(SyncError::configuration("repository name must not be empty"));
    }

    let mut images = enumerate(
        Stage::ListingImages,
        scope,
        |cursor| catalog.images_page(repository, cursor),
        |image: &ImageReference| filter.matches(&image.tag),
    )
    .await?;

    sort_images(&mut images);
    Ok(images)
}

pub fn sort_repositories(repositories: &mut [Repository]) {
    repositories.sort_by(|a, b| a.name.cmp(&b.name));
}

/// Lexicographic on the tag string, not semver aware
pub fn sort_images(images: &mut [ImageReference]) {
    images.sort_by(|a, b| b.tag.cmp(&a.tag));
}

/// Catalog backed by the ECR API
pub struct EcrCatalog {
    client: EcrClient,
    page_size: i32,
}

impl EcrCatalog {
    pub fn new(client: EcrClient, page_size: i32) -> Self {
        Self { client, page_size }
    }

    pub async fn connect(
        region: &str,
        identity: &IdentitySource,
        page_size: i32,
    ) -> Result<Self, SyncError> {
        Ok(Self::new(ecr_client(region, identity).await?, page_size))
    }
}

#[async_trait]
impl RegistryCatalog for EcrCatalog {
    async fn repositories_page(
        &self,
        cursor: Option<String>,
    ) -> Result<Page<Repository>, LookupError> {
        let response = self
            .client
            .describe_repositories()
            .max_results(self.page_size)
            .set_next_token(cursor)
            .send()
            .await
            .map_err(|e| {
                LookupError::unavailable(format!(
                    "Failed to list repositories: {}",
                    format_sdk_error(&e)
                ))
            })?;

        let items = response
            .repositories()
            .iter()
            .filter_map(|repo| repo.repository_name())
            .map(|name| Repository {
                name: name.to_string(),
            })
            .collect();

        Ok(Page {
            items,
            next_cursor: response.next_token().map(String::from),
        })
    }

    async fn images_page(
        &self,
        repository: &str,
        cursor: Option<String>,
    ) -> Result<Page<ImageReference>, LookupError> {
        let response = self
            .client
            .list_images()
            .repository_name(repository)
            .max_results(self.page_size)
            .filter(ListImagesFilter::builder().tag_status(TagStatus::Tagged).build())
            .set_next_token(cursor)
            .send()
            .await
            .map_err(|err| {
                if let Some(service_err) = err.as_service_error() {
                    if service_err.is_repository_not_found_exception() {
                        return LookupError::not_found(format!(
                            "Repository '{}' not found",
                            repository
                        ));
                    }
                }
                LookupError::unavailable(format!(
                    "Failed to list images in '{}': {}",
                    repository,
                    format_sdk_error(&err)
                ))
            })?;

        // Tagged filter is applied server side, but skip anything without a tag regardless
        let items = response
            .image_ids()
            .iter()
            .filter_map(|id| {
                id.image_tag().map(|tag| ImageReference {
                    digest: id.image_digest().unwrap_or_default().to_string(),
                    tag: tag.to_string(),
                })
            })
            .collect();

        Ok(Page {
            items,
            next_cursor: response.next_token().map(String::from),
        })
    }
}

/// Opens [`EcrCatalog`]s with the configured identity and page size
#[derive(Debug, Default, Clone)]
pub struct EcrCatalogProvider;

#[async_trait]
impl CatalogProvider for EcrCatalogProvider {
    async fn open(
        &self,
        region: &str,
        config: &SyncConfig,
    ) -> Result<Box<dyn RegistryCatalog>, SyncError> {
        info!(region, "Opening registry catalog");
        let catalog = EcrCatalog::connect(region, &config.identity, config.page_size).await?;
        Ok(Box::new(catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::FakeCatalog;

    fn image(tag: &str) -> ImageReference {
        ImageReference {
            digest: format!("sha256:{}", tag),
            tag: tag.to_string(),
        }
    }

    fn tags(images: &[ImageReference]) -> Vec<&str> {
        images.iter().map(|i| i.tag.as_str()).collect()
    }

    #[test]
    fn test_images_sort_descending_by_raw_tag() {
        let mut images = vec![image("1.0.0-a"), image("1.0.0-b"), image("0.9.0")];
        sort_images(&mut images);
        assert_eq!(tags(&images), vec!["1.0.0-b", "1.0.0-a", "0.9.0"]);
    }

    #[test]
    fn test_images_sort_is_not_semver_aware() {
        let mut images = vec![image("1.10.0"), image("1.9.0")];
        sort_images(&mut images);
        assert_eq!(tags(&images), vec!["1.9.0", "1.10.0"]);
    }

    #[test]
    fn test_repositories_sort_ascending() {
        let mut repos: Vec<_> = ["zeta", "alpha", "mu"]
            .iter()
            .map(|n| Repository {
                name: n.to_string(),
            })
            .collect();
        sort_repositories(&mut repos);
        let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mu", "zeta"]);
    }

    #[tokio::test]
    async fn test_list_repositories_across_pages() {
        let catalog = FakeCatalog::new()
            .with_repository_pages(vec![vec!["zeta", "alpha"], vec!["mu"], vec!["beta"]]);

        let repos = list_repositories(&catalog, &OperationScope::unbounded())
            .await
            .unwrap();
        let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "mu", "zeta"]);
        assert_eq!(catalog.calls(), 3);
    }

    #[tokio::test]
    async fn test_list_images_filters_then_sorts() {
        let catalog = FakeCatalog::new().with_image_pages(
            "service",
            vec![vec!["1.0.0-dev-1", "2.0.0"], vec!["1.0.0"], vec!["0.1.0-1.0.0"]],
        );

        let images = list_images(
            &catalog,
            "service",
            &TagFilter::new("1.0.0"),
            &OperationScope::unbounded(),
        )
        .await
        .unwrap();

        assert_eq!(tags(&images), vec!["1.0.0-dev-1", "1.0.0", "0.1.0-1.0.0"]);
    }

    #[tokio::test]
    async fn test_list_images_unknown_repository_is_not_found() {
        let catalog = FakeCatalog::new();
        let result = list_images(
            &catalog,
            "missing",
            &TagFilter::default(),
            &OperationScope::unbounded(),
        )
        .await;

        match result {
            Err(SyncError::RegistryLookup { source, .. }) => {
                assert_eq!(source.kind, crate::registry::error::LookupKind::NotFound)
            }
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_images_page_failure_returns_no_partial_result() {
        let catalog = FakeCatalog::new()
            .with_image_pages("service", vec![vec!["1.0.0"], vec!["1.0.1"], vec!["1.0.2"]])
            .failing_image_page(2);

        let result = list_images(
            &catalog,
            "service",
            &TagFilter::default(),
            &OperationScope::unbounded(),
        )
        .await;
        assert!(matches!(result, Err(SyncError::RegistryLookup { .. })));
    }
}
