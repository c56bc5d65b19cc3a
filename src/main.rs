use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod registry;
mod server;

use cli::repo::TargetArgs;
use server::settings::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Check configuration for errors and unused options
    CheckConfig,
    /// List repositories in a region
    #[command(visible_alias = "r")]
    Repos {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List tagged images of a repository, newest tag first
    #[command(visible_alias = "i")]
    Images {
        #[command(flatten)]
        target: TargetArgs,
        /// Repository name
        #[arg(long)]
        repository: String,
        /// Only list tags containing this substring, defaults to `registry.tag_filter`
        #[arg(long)]
        tag_filter: Option<String>,
    },
    /// Pull an image tag, re-tag it to the promote tag and push it back
    #[command(visible_alias = "p")]
    Promote {
        #[command(flatten)]
        target: TargetArgs,
        /// Repository name
        #[arg(long)]
        repository: String,
        /// Tag to promote
        #[arg(long)]
        tag: String,
        /// Registry account, defaults to `registry.account_id`
        #[arg(long)]
        account_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Server commands load settings themselves
    match &cli.command {
        Commands::Serve => return cli::backend::serve().await,
        Commands::CheckConfig => return cli::backend::check_config(),
        _ => {}
    }

    let settings = Settings::new()?;

    match &cli.command {
        Commands::Serve | Commands::CheckConfig => {
            unreachable!("Server commands should have been handled earlier")
        }
        Commands::Repos { target } => cli::repo::list_repositories(&settings, target).await?,
        Commands::Images {
            target,
            repository,
            tag_filter,
        } => {
            cli::repo::list_images(&settings, target, repository, tag_filter.as_deref()).await?
        }
        Commands::Promote {
            target,
            repository,
            tag,
            account_id,
        } => {
            cli::repo::promote(&settings, target, repository, tag, account_id.as_deref()).await?
        }
    }

    Ok(())
}
