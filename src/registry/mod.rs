//! Registry core: credentials, paginated listing and the pull → tag → push pipeline.

pub mod aws;
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod pagination;
pub mod pipeline;
pub mod reference;
pub mod scope;
pub mod token;

#[cfg(test)]
pub mod testing;

pub use catalog::{
    list_images, list_repositories, CatalogProvider, EcrCatalogProvider, ImageReference,
    Repository,
};
pub use config::{IdentitySource, SyncConfig, TagFilter};
pub use credentials::{CredentialProvider, EcrCredentialProvider};
pub use engine::{BollardEngine, ImageEngine, ProgressEvent};
pub use error::{LookupKind, Stage, SyncError};
pub use pipeline::{DiscardProgress, PromoteRequest, SyncPipeline};
pub use scope::OperationScope;
