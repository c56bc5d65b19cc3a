use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use super::models::{
    ImageEntry, ImagesResponse, ListImagesRequest, RepositoriesResponse, RepositoryEntry,
    RetagRequest,
};
use crate::registry::{
    self, DiscardProgress, OperationScope, PromoteRequest, Stage, SyncPipeline,
};
use crate::server::error::ServerError;
use crate::server::state::AppState;

/// Trimmed `value`, or 400 if nothing is left
fn require(field: &str, value: &str) -> Result<String, ServerError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServerError::bad_request(format!("{} must not be empty", field)));
    }
    Ok(value.to_string())
}

fn list_scope(state: &AppState) -> OperationScope {
    OperationScope::with_token(
        state.shutdown.child_token(),
        state.settings.transfer.list_timeout(),
    )
}

/// List every repository in a region, sorted by name
pub async fn list_repositories(
    State(state): State<AppState>,
    Path(region): Path<String>,
) -> Result<Json<RepositoriesResponse>, ServerError> {
    let region = require("region", &region)?;

    let scope = list_scope(&state);
    let catalog = scope
        .run(
            Stage::ListingRepositories,
            state.catalogs.open(&region, &state.sync_config),
        )
        .await?;
    let repositories = registry::list_repositories(catalog.as_ref(), &scope).await?;

    info!(%region, count = repositories.len(), "Listed repositories");

    Ok(Json(RepositoriesResponse {
        repositories: repositories.into_iter().map(RepositoryEntry::from).collect(),
    }))
}

/// List tagged images of a repository matching the configured tag filter, newest tag first
pub async fn list_images(
    State(state): State<AppState>,
    Json(payload): Json<ListImagesRequest>,
) -> Result<Json<ImagesResponse>, ServerError> {
    let region = require("region", &payload.region)?;
    let repository = require("repositoryName", &payload.repository_name)?;

    let scope = list_scope(&state);
    let catalog = scope
        .run(
            Stage::ListingImages,
            state.catalogs.open(&region, &state.sync_config),
        )
        .await?;
    let images = registry::list_images(
        catalog.as_ref(),
        &repository,
        &state.sync_config.tag_filter,
        &scope,
    )
    .await?;

    info!(
        %region,
        %repository,
        count = images.len(),
        "Listed images"
    );

    Ok(Json(ImagesResponse {
        image_ids: images.into_iter().map(ImageEntry::from).collect(),
    }))
}

/// Pull `{repositoryName}:{newLatestTag}`, re-tag it to the promote tag and push it back
pub async fn retag_image(
    State(state): State<AppState>,
    Json(payload): Json<RetagRequest>,
) -> Result<StatusCode, ServerError> {
    let region = require("region", &payload.region)?;
    let repository = require("repositoryName", &payload.repository_name)?;
    let tag = require("newLatestTag", &payload.new_latest_tag)?;

    let account_id = payload
        .account_id
        .as_deref()
        .or(state.settings.registry.account_id.as_deref())
        .ok_or_else(|| {
            ServerError::bad_request("accountID is required when no registry.account_id is configured")
        })?;
    let account_id = require("accountID", account_id)?;

    let request = PromoteRequest {
        region,
        repository,
        tag,
        account_id,
    };
    let scope = OperationScope::with_token(
        state.shutdown.child_token(),
        state.settings.transfer.timeout(),
    );

    let mut pipeline = SyncPipeline::new(
        state.credentials.as_ref(),
        state.engine.as_ref(),
        &state.sync_config,
    );
    let report = pipeline.run(&request, &scope, &DiscardProgress).await?;

    info!(
        source = %report.source,
        destination = %report.destination,
        pull_events = report.pull_events,
        push_events = report.push_events,
        state = %report.state,
        "Promoted image"
    );

    Ok(StatusCode::NO_CONTENT)
}
