use serde::{Deserialize, Serialize};

use crate::registry::{ImageReference, Repository};

/// Response of `GET /repo/{region}`
#[derive(Debug, Serialize, Deserialize)]
pub struct RepositoriesResponse {
    pub repositories: Vec<RepositoryEntry>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryEntry {
    pub repository_name: String,
}

impl From<Repository> for RepositoryEntry {
    fn from(repository: Repository) -> Self {
        Self {
            repository_name: repository.name,
        }
    }
}

/// Body of `POST /repo/images`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListImagesRequest {
    pub region: String,
    pub repository_name: String,
}

/// Response of `POST /repo/images`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagesResponse {
    pub image_ids: Vec<ImageEntry>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    pub image_digest: String,
    pub image_tag: String,
}

impl From<ImageReference> for ImageEntry {
    fn from(image: ImageReference) -> Self {
        Self {
            image_digest: image.digest,
            image_tag: image.tag,
        }
    }
}

/// Body of `POST /repo/retag`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetagRequest {
    pub region: String,
    pub repository_name: String,
    pub new_latest_tag: String,
    /// Falls back to `registry.account_id` when omitted
    #[serde(default, rename = "accountID")]
    pub account_id: Option<String>,
}
