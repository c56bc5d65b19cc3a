use anyhow::{bail, Context, Result};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Attribute, Cell, Table};

use crate::registry::{
    self, BollardEngine, CatalogProvider, EcrCatalogProvider, EcrCredentialProvider,
    IdentitySource, ImageReference, OperationScope, ProgressEvent, PromoteRequest, Repository,
    Stage, SyncConfig, SyncPipeline, TagFilter,
};
use crate::server::settings::Settings;

/// Region and identity flags shared by the registry commands
#[derive(Debug, Clone, clap::Args)]
pub struct TargetArgs {
    /// AWS region, defaults to `registry.default_region`
    #[arg(long)]
    pub region: Option<String>,
    /// Named AWS profile, defaults to `registry.profile` or the default credential chain
    #[arg(long)]
    pub profile: Option<String>,
}

impl TargetArgs {
    fn region(&self, settings: &Settings) -> Result<String> {
        match self
            .region
            .clone()
            .or_else(|| settings.registry.default_region.clone())
        {
            Some(region) if !region.trim().is_empty() => Ok(region),
            _ => bail!("No region given. Pass --region or set registry.default_region"),
        }
    }

    /// Registry settings with command-line overrides applied
    fn sync_config(&self, settings: &Settings, tag_filter: Option<&str>) -> Result<SyncConfig> {
        let mut config = settings.registry.sync_config();
        if let Some(profile) = &self.profile {
            config.identity = IdentitySource::from_profile(Some(profile));
        }
        if let Some(filter) = tag_filter {
            config.tag_filter = TagFilter::new(filter);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Scope cancelled by Ctrl+C
fn interruptible_scope(timeout: Option<std::time::Duration>) -> OperationScope {
    let scope = OperationScope::new(timeout);
    let on_signal = scope.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, cancelling...");
            on_signal.cancel();
        }
    });
    scope
}

fn repositories_table(repositories: &[Repository]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![Cell::new("REPOSITORY").add_attribute(Attribute::Bold)]);

    for repository in repositories {
        table.add_row(vec![Cell::new(&repository.name)]);
    }
    table
}

fn images_table(images: &[ImageReference]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("TAG").add_attribute(Attribute::Bold),
            Cell::new("DIGEST").add_attribute(Attribute::Bold),
        ]);

    for image in images {
        table.add_row(vec![Cell::new(&image.tag), Cell::new(&image.digest)]);
    }
    table
}

pub async fn list_repositories(settings: &Settings, target: &TargetArgs) -> Result<()> {
    let region = target.region(settings)?;
    let config = target.sync_config(settings, None)?;
    let scope = interruptible_scope(settings.transfer.list_timeout());

    let catalog = EcrCatalogProvider.open(&region, &config).await?;
    let repositories = registry::list_repositories(catalog.as_ref(), &scope)
        .await
        .with_context(|| format!("Failed to list repositories in {}", region))?;

    if repositories.is_empty() {
        println!("No repositories found in {}", region);
        return Ok(());
    }

    println!("{}", repositories_table(&repositories));
    Ok(())
}

pub async fn list_images(
    settings: &Settings,
    target: &TargetArgs,
    repository: &str,
    tag_filter: Option<&str>,
) -> Result<()> {
    let region = target.region(settings)?;
    let config = target.sync_config(settings, tag_filter)?;
    let scope = interruptible_scope(settings.transfer.list_timeout());

    let catalog = EcrCatalogProvider.open(&region, &config).await?;
    let images = registry::list_images(catalog.as_ref(), repository, &config.tag_filter, &scope)
        .await
        .with_context(|| format!("Failed to list images of '{}'", repository))?;

    if images.is_empty() {
        println!(
            "No tagged images matching '{}' in '{}'",
            config.tag_filter.substring(),
            repository
        );
        return Ok(());
    }

    println!("{}", images_table(&images));
    Ok(())
}

fn print_progress(stage: Stage, event: &ProgressEvent) {
    println!("[{}] {}", stage, event);
}

pub async fn promote(
    settings: &Settings,
    target: &TargetArgs,
    repository: &str,
    tag: &str,
    account_id: Option<&str>,
) -> Result<()> {
    let region = target.region(settings)?;
    let config = target.sync_config(settings, None)?;
    let account_id = match account_id
        .map(str::to_string)
        .or_else(|| settings.registry.account_id.clone())
    {
        Some(account_id) => account_id,
        None => bail!("No account given. Pass --account-id or set registry.account_id"),
    };

    let engine = BollardEngine::connect().context("Failed to connect to Docker engine")?;
    let credentials = EcrCredentialProvider;
    let scope = interruptible_scope(settings.transfer.timeout());

    let request = PromoteRequest {
        region,
        repository: repository.to_string(),
        tag: tag.to_string(),
        account_id,
    };

    let mut pipeline = SyncPipeline::new(&credentials, &engine, &config);
    let report = pipeline.run(&request, &scope, &print_progress).await?;

    println!(
        "✓ Promoted {} to {} ({} pull / {} push events)",
        report.source, report.destination, report.pull_events, report.push_events
    );
    Ok(())
}
