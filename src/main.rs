use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use visual_conditions::builder::{CatalogClient, ClientConfig, HttpCatalog};
use visual_conditions::conditions::ConditionList;
use visual_conditions::site::server::{self, AppState};
use visual_conditions::site::{PageContext, SiteCatalog};

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the catalog endpoints of a site file
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,

        /// Path to the site catalog YAML
        #[arg(short, long)]
        site: PathBuf,
    },
    /// Evaluate a saved condition list against a page context
    Evaluate {
        /// Path to the condition list JSON
        #[arg(short, long)]
        conditions: PathBuf,

        /// Path to the page context YAML or JSON
        #[arg(long)]
        context: PathBuf,

        /// Treat unknown operators as include
        #[arg(long)]
        lenient: bool,
    },
    /// List the sources catalog of a remote host
    Sources {
        /// Catalog base URL, defaults to VC_CATALOG_URL
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Search the items of one source on a remote host
    Items {
        /// Source key, e.g. post__specific
        #[arg(short, long)]
        source: String,

        #[arg(long, default_value = "")]
        search: String,

        /// Catalog base URL, defaults to VC_CATALOG_URL
        #[arg(short, long)]
        url: Option<String>,
    },
}

fn http_catalog(url: Option<String>) -> anyhow::Result<HttpCatalog> {
    match url {
        Some(url) => {
            let token = std::env::var("VC_API_TOKEN").ok().filter(|t| !t.is_empty());
            Ok(HttpCatalog::new(url, token))
        }
        None => Ok(HttpCatalog::from_env()?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Serve { port, site } => {
            let catalog = SiteCatalog::load(&site)
                .with_context(|| format!("Failed to load site {}", site.display()))?;
            log::info!("Serving site {}", site.display());
            server::serve(port, AppState::from_env(catalog)).await?;
        }
        Commands::Evaluate {
            conditions,
            context,
            lenient,
        } => {
            let raw = fs::read_to_string(&conditions)
                .with_context(|| format!("Failed to read {}", conditions.display()))?;
            let list = if lenient {
                ConditionList::from_json_lenient(&raw)?
            } else {
                ConditionList::from_json(&raw)?
            };
            let page = PageContext::load(&context)
                .with_context(|| format!("Failed to load context {}", context.display()))?;

            log::debug!("Evaluating {} conditions", list.len());
            println!("{}", list.evaluate(&page));
        }
        Commands::Sources { url } => {
            let client = CatalogClient::from_provider(
                Arc::new(http_catalog(url)?),
                ClientConfig::from_env()?,
            );
            let catalog = client.list_sources().await?;
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        Commands::Items { source, search, url } => {
            let client = CatalogClient::from_provider(
                Arc::new(http_catalog(url)?),
                ClientConfig::from_env()?,
            );
            let catalog = client.list_sources().await?;
            let source = catalog
                .find(&source)
                .with_context(|| format!("Unknown source '{}'", source))?;
            if !source.searchable {
                log::warn!("Source '{}' has no items to list", source.key);
            }

            for item in client.list_items(source, &search).await? {
                println!("{}\t{}", item.id, item.label);
            }
        }
    }

    Ok(())
}
