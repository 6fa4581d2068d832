//! Pagesnap CLI - migrations, snapshot maintenance and diagnostics.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! pagesnap migrate
//!
//! # Regenerate every snapshot of a store, or of one root or leaf
//! pagesnap regenerate --store 6f1c7a52-3f4e-4a43-9a43-2b9c7f1f0c11
//! pagesnap regenerate --page 0d6e4c1b-5f0a-4c55-8d37-1c5b0f1e2a90
//!
//! # Mark a domain's snapshots stale (or delete them)
//! pagesnap invalidate --domain shop.example.com
//!
//! # See what a request resolves to, and whether a client is a crawler
//! pagesnap resolve shop.example.com /about
//! pagesnap classify "Mozilla/5.0 (compatible; Googlebot/2.1)"
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `regenerate` - Regenerate snapshots for a store, root or leaf
//! - `invalidate` - Invalidate or delete a domain's snapshots
//! - `resolve` - Print the `ContentRef` for a host and path
//! - `classify` - Print the classifier's verdict for a `User-Agent`

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "pagesnap")]
#[command(author, version, about = "Pagesnap CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Regenerate snapshots
    Regenerate {
        #[command(flatten)]
        target: RegenerateTarget,
    },
    /// Invalidate every snapshot reachable through a domain
    Invalidate {
        /// Custom domain hostname
        #[arg(short, long)]
        domain: String,

        /// Delete the domain's snapshots instead of marking them stale
        #[arg(long)]
        delete: bool,
    },
    /// Resolve a host and path to a content reference
    Resolve {
        /// Request hostname (port and case are ignored)
        host: String,
        /// Request path
        #[arg(default_value = "/")]
        path: String,
    },
    /// Classify a User-Agent string
    Classify {
        /// The User-Agent header value
        user_agent: String,
    },
}

/// Exactly one regeneration scope.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct RegenerateTarget {
    /// Every published leaf of a store, on every domain
    #[arg(long)]
    store: Option<Uuid>,
    /// Every published page of a website
    #[arg(long)]
    website: Option<Uuid>,
    /// Every published step of a funnel
    #[arg(long)]
    funnel: Option<Uuid>,
    /// A single website page
    #[arg(long)]
    page: Option<Uuid>,
    /// A single funnel step
    #[arg(long)]
    step: Option<Uuid>,
}

impl RegenerateTarget {
    fn scope(&self) -> Option<commands::regenerate::Scope> {
        use commands::regenerate::Scope;

        self.store
            .map(Scope::Store)
            .or_else(|| self.website.map(Scope::Website))
            .or_else(|| self.funnel.map(Scope::Funnel))
            .or_else(|| self.page.map(Scope::Page))
            .or_else(|| self.step.map(Scope::Step))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagesnap=info,pagesnap_snapshot=info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Regenerate { target } => {
            let scope = target.scope().ok_or(commands::CliError::MissingScope)?;
            commands::regenerate::run(scope).await?;
        }
        Commands::Invalidate { domain, delete } => {
            commands::regenerate::invalidate_domain(&domain, delete).await?;
        }
        Commands::Resolve { host, path } => commands::inspect::resolve(&host, &path).await?,
        Commands::Classify { user_agent } => commands::inspect::classify(&user_agent)?,
    }
    Ok(())
}
